//! # Seen Set
//! Bounded, thread-safe set of delivered item fingerprints.
//!
//! Entries expire after a retention window and the oldest are evicted once the
//! set exceeds its capacity. `check_and_insert` is the only mutation and runs
//! under one lock, so concurrent source pipelines cannot both admit the same link.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Twice the 24h freshness window.
pub const DEFAULT_RETENTION_HOURS: i64 = 48;
pub const DEFAULT_CAPACITY: usize = 50_000;

/// Canonical form of an item link: surrounding whitespace and `#fragment` removed.
pub fn canonical_link(link: &str) -> &str {
    let t = link.trim();
    match t.split_once('#') {
        Some((head, _)) => head,
        None => t,
    }
}

/// Hex SHA-256 of the canonical link.
pub fn fingerprint(link: &str) -> String {
    let digest = Sha256::digest(canonical_link(link).as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug)]
pub struct SeenSet {
    inner: Mutex<Inner>,
    retention: Duration,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    members: HashSet<String>,
    /// Insertion order as `(inserted_at, fingerprint)`.
    order: VecDeque<(DateTime<Utc>, String)>,
}

impl Inner {
    fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        while let Some((ts, _)) = self.order.front() {
            if *ts >= cutoff {
                break;
            }
            if let Some((_, fp)) = self.order.pop_front() {
                self.members.remove(&fp);
            }
        }
    }

    fn evict_over(&mut self, capacity: usize) {
        while self.order.len() > capacity {
            if let Some((_, fp)) = self.order.pop_front() {
                self.members.remove(&fp);
            }
        }
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_RETENTION_HOURS), DEFAULT_CAPACITY)
    }
}

impl SeenSet {
    /// `capacity` of 0 is treated as 1.
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            retention,
            capacity: capacity.max(1),
        }
    }

    /// Record `fp` as seen at `now`. Returns `false` if it was already present.
    pub fn check_and_insert(&self, fp: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.evict_before(now - self.retention);
        if !inner.members.insert(fp.to_string()) {
            return false;
        }
        inner.order.push_back((now, fp.to_string()));
        inner.evict_over(self.capacity);
        true
    }

    pub fn contains(&self, fp: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.members.contains(fp)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

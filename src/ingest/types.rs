// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One entry as parsed from a feed document, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
}

/// A classified, deduplicated item ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub priority: u8, // 1 = most urgent
    pub category: String,
    pub timestamp: DateTime<Utc>, // publish time, or fetch time if the feed had none
    pub fingerprint: String,
    pub via_mirror: bool,
}

/// Entries from the first candidate URL that answered with a usable feed.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub entries: Vec<RawEntry>,
    pub url: String,
    pub via_mirror: bool,
}

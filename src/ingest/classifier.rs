//! # Classifier
//! Turns a [`RawEntry`] into a [`NewsItem`] or a [`Rejected`] reason.
//!
//! Order of checks:
//! 1) title and link present
//! 2) title passes the whitelist/blacklist
//! 3) publish time inside the freshness window
//! 4) fingerprint not seen before (atomic insert, last so only emitted items are recorded)
//!
//! Priority: critical keyword → 1; tracked company → min(base, 2); else base.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::ingest::dedup::{fingerprint, SeenSet};
use crate::ingest::lexicon::KeywordMatcher;
use crate::ingest::types::{NewsItem, RawEntry};
use crate::sources::{FilterSet, Source, MAX_PRIORITY, MIN_PRIORITY};

pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

/// Policy-rate, regulator, official, currency and commodity terms, plus the
/// largest issuers. Газпром stays tracked-only.
pub const DEFAULT_CRITICAL_KEYWORDS: &[&str] = &[
    "ключевая ставка",
    "санкции",
    "цб рф",
    "банк россии",
    "набиуллина",
    "мишустин",
    "силуанов",
    "курс рубля",
    "нефть",
    "золото",
    "инфляция",
    "сбербанк",
    "лукойл",
    "роснефт",
];

pub const DEFAULT_TRACKED_COMPANIES: &[&str] = &[
    "газпром",
    "норникель",
    "яндекс",
    "тинькофф",
    "вымпелком",
    "мтс",
    "мегафон",
    "северсталь",
    "нлмк",
    "новатэк",
    "магнит",
    "х5",
    "сургутнефтегаз",
    "татнефт",
    "алроса",
    "полюс",
    "фосагро",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityRules {
    pub critical: Vec<String>,
    pub tracked: Vec<String>,
}

impl Default for PriorityRules {
    fn default() -> Self {
        Self {
            critical: DEFAULT_CRITICAL_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            tracked: DEFAULT_TRACKED_COMPANIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("entry has no title")]
    MissingTitle,
    #[error("entry has no link")]
    MissingLink,
    #[error("title rejected by filters")]
    Filtered,
    #[error("published {age_hours}h ago, outside the freshness window")]
    Stale { age_hours: i64 },
    #[error("already seen")]
    Duplicate,
}

impl Rejected {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Rejected::MissingTitle => "missing_title",
            Rejected::MissingLink => "missing_link",
            Rejected::Filtered => "filtered",
            Rejected::Stale { .. } => "stale",
            Rejected::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug)]
pub struct Classifier {
    filters: FilterSet,
    rules: PriorityRules,
    matcher: KeywordMatcher,
    seen: Arc<SeenSet>,
    freshness: Duration,
}

impl Classifier {
    pub fn new(filters: FilterSet, seen: Arc<SeenSet>) -> Self {
        Self {
            filters,
            rules: PriorityRules::default(),
            matcher: KeywordMatcher::plain(),
            seen,
            freshness: Duration::hours(FRESHNESS_WINDOW_HOURS),
        }
    }

    pub fn with_rules(mut self, rules: PriorityRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_matcher(mut self, matcher: KeywordMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn seen(&self) -> &Arc<SeenSet> {
        &self.seen
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn priority_for(&self, title: &str, description: &str, base: u8) -> u8 {
        let base = base.clamp(MIN_PRIORITY, MAX_PRIORITY);
        let text = self.matcher.prepare(&format!("{title} {description}"));
        if text.mentions_any(&self.rules.critical) {
            return MIN_PRIORITY;
        }
        if text.mentions_any(&self.rules.tracked) {
            return base.min(2);
        }
        base
    }

    fn title_passes(&self, title: &str) -> bool {
        let prepared = self.matcher.prepare(title);
        self.filters
            .passes_with(title, |_, term| prepared.mentions(term))
    }

    pub fn classify(
        &self,
        entry: RawEntry,
        source: &Source,
        via_mirror: bool,
        now: DateTime<Utc>,
    ) -> Result<NewsItem, Rejected> {
        let title = entry.title.trim();
        if title.is_empty() {
            return Err(Rejected::MissingTitle);
        }
        let link = entry.link.trim();
        if link.is_empty() {
            return Err(Rejected::MissingLink);
        }
        if !self.title_passes(title) {
            return Err(Rejected::Filtered);
        }

        let timestamp = match entry.published {
            Some(published) => {
                let age = now.signed_duration_since(published);
                if age > self.freshness {
                    return Err(Rejected::Stale {
                        age_hours: age.num_hours(),
                    });
                }
                published
            }
            None => now,
        };

        let fp = fingerprint(link);
        if !self.seen.check_and_insert(&fp, now) {
            return Err(Rejected::Duplicate);
        }

        Ok(NewsItem {
            title: title.to_string(),
            url: link.to_string(),
            source: source.name.clone(),
            priority: self.priority_for(title, &entry.description, source.priority),
            category: source.category.clone(),
            timestamp,
            fingerprint: fp,
            via_mirror,
        })
    }
}

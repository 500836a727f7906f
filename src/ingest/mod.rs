// src/ingest/mod.rs
pub mod classifier;
pub mod dedup;
pub mod feed;
pub mod fetcher;
pub mod lexicon;
pub mod mirrors;
pub mod scheduler;
pub mod types;

use crate::ingest::classifier::Classifier;
use crate::ingest::fetcher::{FetchFailure, Fetcher};
use crate::ingest::types::NewsItem;
use crate::sources::Source;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// Max characters kept from a title or description.
pub const MAX_TEXT_CHARS: usize = 1500;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "news_fetch_attempts_total",
            "HTTP attempts against feed URLs, mirrors included."
        );
        describe_counter!(
            "news_source_failures_total",
            "Sources whose every candidate URL failed in a cycle."
        );
        describe_counter!(
            "news_items_kept_total",
            "Items that passed filters, freshness and dedup."
        );
        describe_counter!(
            "news_items_rejected_total",
            "Entries dropped during classification, by reason."
        );
        describe_counter!("news_delivered_total", "Messages accepted by the chat API.");
        describe_counter!(
            "news_delivery_failures_total",
            "Messages the chat API rejected or never answered."
        );
        describe_gauge!(
            "news_seen_fingerprints",
            "Fingerprints currently held by the seen-set."
        );
        describe_histogram!("news_cycle_ms", "Wall time of one monitoring cycle.");
        describe_gauge!(
            "news_cycle_last_run_ts",
            "Unix ts when the last monitoring cycle finished."
        );
    });
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 4) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// Fetch one source and classify its entries.
/// Rejections are counted per reason; only a failed fetch is an error.
pub async fn collect_source(
    fetcher: &Fetcher,
    classifier: &Classifier,
    source: &Source,
) -> Result<Vec<NewsItem>, FetchFailure> {
    ensure_metrics_described();

    let outcome = fetcher.fetch(source).await?;
    let now = chrono::Utc::now();
    let total = outcome.entries.len();

    let mut kept = Vec::with_capacity(total);
    for entry in outcome.entries {
        match classifier.classify(entry, source, outcome.via_mirror, now) {
            Ok(item) => kept.push(item),
            Err(reason) => {
                counter!("news_items_rejected_total", "reason" => reason.label()).increment(1);
                tracing::debug!(source = %source.name, %reason, "entry rejected");
            }
        }
    }
    counter!("news_items_kept_total").increment(kept.len() as u64);

    tracing::info!(
        source = %source.name,
        url = %outcome.url,
        via_mirror = outcome.via_mirror,
        entries = total,
        kept = kept.len(),
        "source collected"
    );
    Ok(kept)
}

/// Merge per-source batches and order by priority, most urgent first.
/// The sort is stable: equal priorities keep source order, then feed order.
pub fn aggregate(batches: Vec<Vec<NewsItem>>) -> Vec<NewsItem> {
    let mut items: Vec<NewsItem> = batches.into_iter().flatten().collect();
    items.sort_by_key(|item| item.priority);
    items
}

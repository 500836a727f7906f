// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod notify;
pub mod run_flag;
pub mod sources;
pub mod telemetry;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::ingest::classifier::Classifier;
use crate::ingest::dedup::SeenSet;
use crate::ingest::fetcher::{FetchPolicy, Fetcher};
use crate::ingest::scheduler::{Monitor, MonitorCfg};
use crate::notify::dispatcher::Dispatcher;
use crate::notify::telegram::TelegramNotifier;
use crate::sources::{FilterSet, SourceRegistry};

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::types::NewsItem;
pub use crate::notify::Notifier;
pub use crate::run_flag::RunFlag;

/// Wire the production pipeline: HTTP fetcher, fresh seen-set, Telegram delivery.
pub fn build_monitor(
    cfg: &AppConfig,
    registry: SourceRegistry,
    filters: FilterSet,
) -> anyhow::Result<Monitor> {
    let fetcher = Fetcher::new(FetchPolicy::default())?;
    let classifier = Classifier::new(filters, Arc::new(SeenSet::default()));
    let notifier = TelegramNotifier::new(cfg.bot_token.clone(), cfg.chat_id.clone())
        .with_api_base(cfg.telegram_api_base.clone());
    let dispatcher = Dispatcher::new(Arc::new(notifier));

    Ok(Monitor::new(
        registry,
        fetcher,
        classifier,
        dispatcher,
        MonitorCfg::every_minutes(cfg.interval_minutes),
    ))
}

//! Sequential delivery with per-priority pacing.
//!
//! Items go out one at a time in the order given. A failed send is logged and
//! skipped; the next item still goes out. The run flag is checked before each
//! send, so a stop request ends the batch early.

use super::Notifier;
use crate::ingest::types::NewsItem;
use crate::run_flag::RunFlag;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Pause after a delivery, chosen by the delivered item's priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub urgent: Duration,
    pub normal: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            urgent: Duration::from_millis(500),
            normal: Duration::from_secs(2),
        }
    }
}

impl Pacing {
    pub fn after(&self, priority: u8) -> Duration {
        if priority <= 1 {
            self.urgent
        } else {
            self.normal
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Left undelivered because the monitor was stopped.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    pacing: Pacing,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("notifier", &self.notifier.name())
            .field("pacing", &self.pacing)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn deliver(&self, items: Vec<NewsItem>, running: &RunFlag) -> DispatchReport {
        let mut report = DispatchReport::default();
        let total = items.len();

        for (idx, item) in items.iter().enumerate() {
            if !running.is_running() {
                report.skipped = total - idx;
                tracing::info!(skipped = report.skipped, "stop requested, dispatch cut short");
                break;
            }

            match self.notifier.send(item).await {
                Ok(()) => {
                    report.sent += 1;
                    counter!("news_delivered_total").increment(1);
                    tracing::info!(
                        source = %item.source,
                        priority = item.priority,
                        title = %item.title,
                        "news delivered"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("news_delivery_failures_total").increment(1);
                    tracing::error!(
                        error = ?e,
                        notifier = self.notifier.name(),
                        source = %item.source,
                        url = %item.url,
                        "delivery failed"
                    );
                }
            }

            if idx + 1 < total {
                tokio::time::sleep(self.pacing.after(item.priority)).await;
            }
        }

        report
    }
}

// src/ingest/scheduler.rs
//! Monitoring loop: fan out one task per enabled source, merge, dispatch, sleep.
//!
//! `Idle → Running → (Fetching → Aggregating → Dispatching) → Sleeping → Fetching …`,
//! with `Stopped` reachable from any state once the run flag is cleared.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::ingest::classifier::Classifier;
use crate::ingest::fetcher::Fetcher;
use crate::ingest::types::NewsItem;
use crate::ingest::{aggregate, collect_source, ensure_metrics_described};
use crate::notify::dispatcher::{DispatchReport, Dispatcher};
use crate::run_flag::RunFlag;
use crate::sources::SourceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Running,
    Fetching,
    Aggregating,
    Dispatching,
    Sleeping,
    Stopped,
}

#[derive(Clone, Copy, Debug)]
pub struct MonitorCfg {
    /// Pause between cycles.
    pub interval: Duration,
    /// Granularity of stop-flag checks while sleeping.
    pub tick: Duration,
    /// Pause after a failed cycle.
    pub cooldown: Duration,
    /// Bound on the whole fetch fan-out of one cycle.
    pub fetch_deadline: Duration,
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2 * 60),
            tick: Duration::from_secs(1),
            cooldown: Duration::from_secs(60),
            fetch_deadline: Duration::from_secs(5 * 60),
        }
    }
}

impl MonitorCfg {
    pub fn every_minutes(minutes: u64) -> Self {
        Self {
            interval: Duration::from_secs(minutes.max(1) * 60),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Enabled sources at cycle start.
    pub sources: usize,
    /// Sources that produced nothing: fetch failure, panic or deadline.
    pub failed_sources: Vec<String>,
    /// Items handed to the dispatcher.
    pub collected: usize,
    pub dispatch: DispatchReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub cycles: u64,
    pub last_cycle: Option<CycleReport>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub seen_fingerprints: usize,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            state: MonitorState::Idle,
            cycles: 0,
            last_cycle: None,
            last_cycle_at: None,
            seen_fingerprints: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("cycle task panicked: {0}")]
    Panicked(String),
    #[error("cycle task cancelled")]
    Cancelled,
}

impl From<tokio::task::JoinError> for CycleError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            CycleError::Cancelled
        } else {
            CycleError::Panicked(e.to_string())
        }
    }
}

#[derive(Debug)]
struct Inner {
    registry: RwLock<SourceRegistry>,
    fetcher: Fetcher,
    classifier: Arc<Classifier>,
    dispatcher: Dispatcher,
    cfg: MonitorCfg,
    running: RunFlag,
    status: Mutex<MonitorStatus>,
}

/// Cheap to clone; clones drive and observe the same loop.
#[derive(Debug, Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    pub fn new(
        registry: SourceRegistry,
        fetcher: Fetcher,
        classifier: Classifier,
        dispatcher: Dispatcher,
        cfg: MonitorCfg,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(registry),
                fetcher,
                classifier: Arc::new(classifier),
                dispatcher,
                cfg,
                running: RunFlag::new(),
                status: Mutex::new(MonitorStatus::default()),
            }),
        }
    }

    pub fn running(&self) -> &RunFlag {
        &self.inner.running
    }

    pub fn stop(&self) {
        self.inner.running.stop();
    }

    pub fn cfg(&self) -> &MonitorCfg {
        &self.inner.cfg
    }

    pub fn status(&self) -> MonitorStatus {
        let mut st = self.lock_status().clone();
        st.seen_fingerprints = self.inner.classifier.seen().len();
        st
    }

    /// Takes effect from the next cycle. Returns false for an unknown source.
    pub fn set_source_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut reg = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let found = reg.set_enabled(name, enabled);
        if found {
            tracing::info!(source = name, enabled, "source toggled");
        }
        found
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, MonitorStatus> {
        self.inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: MonitorState) {
        self.lock_status().state = state;
    }

    /// One full cycle: fetch all enabled sources concurrently, merge, dispatch.
    pub async fn run_cycle(&self) -> CycleReport {
        ensure_metrics_described();
        let started = Instant::now();

        self.set_state(MonitorState::Fetching);
        let sources = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled();

        let mut set = JoinSet::new();
        let mut index_by_task = HashMap::with_capacity(sources.len());
        for (idx, source) in sources.iter().cloned().enumerate() {
            let fetcher = self.inner.fetcher.clone();
            let classifier = Arc::clone(&self.inner.classifier);
            let handle =
                set.spawn(async move { collect_source(&fetcher, &classifier, &source).await });
            index_by_task.insert(handle.id(), idx);
        }

        let mut batches: Vec<Option<Vec<NewsItem>>> = vec![None; sources.len()];
        let mut failed = vec![false; sources.len()];
        let deadline = tokio::time::Instant::now() + self.inner.cfg.fetch_deadline;

        loop {
            let joined = match tokio::time::timeout_at(deadline, set.join_next_with_id()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    set.abort_all();
                    for (idx, source) in sources.iter().enumerate() {
                        if batches[idx].is_none() && !failed[idx] {
                            failed[idx] = true;
                            counter!("news_source_failures_total").increment(1);
                            tracing::warn!(
                                source = %source.name,
                                deadline_secs = self.inner.cfg.fetch_deadline.as_secs(),
                                "source aborted at fetch deadline"
                            );
                        }
                    }
                    break;
                }
            };

            match joined {
                Ok((id, Ok(items))) => {
                    if let Some(&idx) = index_by_task.get(&id) {
                        batches[idx] = Some(items);
                    }
                }
                Ok((id, Err(failure))) => {
                    if let Some(&idx) = index_by_task.get(&id) {
                        failed[idx] = true;
                    }
                    counter!("news_source_failures_total").increment(1);
                    tracing::warn!(
                        source = %failure.source_name,
                        error = %failure.last_error,
                        attempted = ?failure.attempted,
                        "source failed"
                    );
                }
                Err(join_err) => {
                    let name = index_by_task.get(&join_err.id()).map(|&idx| {
                        failed[idx] = true;
                        sources[idx].name.as_str()
                    });
                    counter!("news_source_failures_total").increment(1);
                    tracing::error!(error = %join_err, source = ?name, "source task died");
                }
            }
        }

        self.set_state(MonitorState::Aggregating);
        let items = aggregate(batches.into_iter().flatten().collect());
        let collected = items.len();

        self.set_state(MonitorState::Dispatching);
        let dispatch = self
            .inner
            .dispatcher
            .deliver(items, &self.inner.running)
            .await;

        let report = CycleReport {
            sources: sources.len(),
            failed_sources: sources
                .iter()
                .zip(&failed)
                .filter(|(_, f)| **f)
                .map(|(s, _)| s.name.clone())
                .collect(),
            collected,
            dispatch,
        };

        let seen = self.inner.classifier.seen().len();
        let now = Utc::now();
        histogram!("news_cycle_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        gauge!("news_seen_fingerprints").set(seen as f64);
        gauge!("news_cycle_last_run_ts").set(now.timestamp() as f64);

        {
            let mut st = self.lock_status();
            st.cycles += 1;
            st.last_cycle = Some(report.clone());
            st.last_cycle_at = Some(now);
            st.seen_fingerprints = seen;
            st.state = if self.inner.running.is_running() {
                MonitorState::Running
            } else {
                MonitorState::Idle
            };
        }

        tracing::info!(
            sources = report.sources,
            failed = report.failed_sources.len(),
            collected,
            sent = report.dispatch.sent,
            delivery_failures = report.dispatch.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle finished"
        );
        report
    }

    /// [`run_cycle`](Self::run_cycle) on its own task, so a panic becomes a [`CycleError`].
    pub async fn run_cycle_guarded(&self) -> Result<CycleReport, CycleError> {
        let this = self.clone();
        Ok(tokio::spawn(async move { this.run_cycle().await }).await?)
    }

    /// Poll until [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        let running = &self.inner.running;
        if !running.start() {
            self.set_state(MonitorState::Stopped);
            tracing::info!("monitor stopped before it started");
            return;
        }
        self.set_state(MonitorState::Running);
        tracing::info!(
            interval_secs = self.inner.cfg.interval.as_secs(),
            "monitor started"
        );

        while running.is_running() {
            let pause = match self.run_cycle_guarded().await {
                Ok(_) => self.inner.cfg.interval,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        cooldown_secs = self.inner.cfg.cooldown.as_secs(),
                        "cycle failed, cooling down"
                    );
                    self.inner.cfg.cooldown
                }
            };
            if !running.is_running() {
                break;
            }
            self.set_state(MonitorState::Sleeping);
            self.sleep_while_running(pause).await;
        }

        self.set_state(MonitorState::Stopped);
        tracing::info!("monitor stopped");
    }

    /// Sleep up to `total`, waking every tick to honour a stop request.
    async fn sleep_while_running(&self, total: Duration) {
        let tick = self.inner.cfg.tick.max(Duration::from_millis(1));
        let mut left = total;
        while !left.is_zero() && self.inner.running.is_running() {
            let step = left.min(tick);
            tokio::time::sleep(step).await;
            left = left.saturating_sub(step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::dedup::SeenSet;
    use crate::ingest::fetcher::FetchPolicy;
    use crate::notify::Notifier;
    use crate::sources::{FilterSet, Source};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Silent;

    #[async_trait::async_trait]
    impl Notifier for Silent {
        async fn send(&self, _item: &NewsItem) -> anyhow::Result<()> {
            Ok(())
        }
        fn name(&self) -> &'static str {
            "silent"
        }
    }

    /// Counts calls, then panics inside the cycle task.
    #[derive(Default)]
    struct Exploding {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Notifier for Exploding {
        async fn send(&self, _item: &NewsItem) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("notifier exploded");
        }
        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    fn monitor_with(
        sources: Vec<Source>,
        notifier: Arc<dyn Notifier>,
        cfg: MonitorCfg,
    ) -> Monitor {
        Monitor::new(
            SourceRegistry::from_sources(sources).unwrap(),
            Fetcher::new(FetchPolicy::default()).unwrap(),
            Classifier::new(FilterSet::default(), Arc::new(SeenSet::default())),
            Dispatcher::new(notifier),
            cfg,
        )
    }

    fn monitor(cfg: MonitorCfg) -> Monitor {
        monitor_with(vec![], Arc::new(Silent), cfg)
    }

    #[test]
    fn interval_is_at_least_one_minute() {
        assert_eq!(MonitorCfg::every_minutes(0).interval, Duration::from_secs(60));
        assert_eq!(MonitorCfg::every_minutes(5).interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn empty_registry_cycle_is_a_noop() {
        let m = monitor(MonitorCfg::default());
        let report = m.run_cycle().await;
        assert_eq!(report, CycleReport::default());
        let st = m.status();
        assert_eq!(st.cycles, 1);
        assert_eq!(st.state, MonitorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_sleep_within_a_tick() {
        let m = monitor(MonitorCfg::default());
        let handle = tokio::spawn({
            let m = m.clone();
            async move { m.run().await }
        });
        // first cycle is empty; the loop is now sleeping the 2 min interval
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(m.status().state, MonitorState::Sleeping);

        m.stop();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop exits within a tick")
            .unwrap();
        assert_eq!(m.status().state, MonitorState::Stopped);
    }

    #[tokio::test]
    async fn stop_before_run_is_honoured() {
        let m = monitor(MonitorCfg::default());
        m.stop();
        tokio::time::timeout(Duration::from_secs(1), m.run())
            .await
            .expect("run returns at once");
        let st = m.status();
        assert_eq!(st.state, MonitorState::Stopped);
        assert_eq!(st.cycles, 0);
        assert!(!m.running().is_running());
    }

    #[tokio::test]
    async fn failed_cycle_cools_down_then_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<rss><channel><item><title>Нефть дорожает</title>\
                 <link>https://x.test/oil</link></item></channel></rss>",
            ))
            .mount(&server)
            .await;

        let notifier = Arc::new(Exploding::default());
        let cfg = MonitorCfg {
            interval: Duration::from_secs(3600),
            tick: Duration::from_millis(10),
            cooldown: Duration::from_millis(50),
            fetch_deadline: Duration::from_secs(5),
        };
        let m = monitor_with(
            vec![Source::new("Тестовый", format!("{}/feed.rss", server.uri()))],
            notifier.clone(),
            cfg,
        );
        let handle = tokio::spawn({
            let m = m.clone();
            async move { m.run().await }
        });

        // the panicking cycle is not counted; the retry after the cooldown is
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let st = m.status();
                if st.cycles >= 1 && st.state == MonitorState::Sleeping {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("retry ran after the cooldown, not the interval");

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        let st = m.status();
        // the item was recorded before the panic, so the retry delivers nothing
        assert_eq!(st.last_cycle.map(|r| r.collected), Some(0));
        assert_eq!(st.state, MonitorState::Sleeping);

        m.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop exits within a tick")
            .unwrap();
        assert_eq!(m.status().state, MonitorState::Stopped);
    }

    #[test]
    fn toggling_unknown_source_is_reported() {
        let m = monitor(MonitorCfg::default());
        assert!(!m.set_source_enabled("nope", false));
    }
}

//! Market News Relay: binary entrypoint.
//! Starts the feed monitor in the background and serves liveness, status and metrics.

use anyhow::Context;
use market_news_relay::config::AppConfig;
use market_news_relay::sources::{FilterSet, SourceRegistry};
use market_news_relay::telemetry::Metrics;
use market_news_relay::{api, build_monitor};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON with `LOG_FORMAT=json`. A subscriber installed by
/// the host runtime takes precedence.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("market_news_relay=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn relay() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env()?;
    tracing::info!(config = ?cfg, "configuration loaded");

    let registry = SourceRegistry::load_from(&cfg.sources_path)
        .with_context(|| format!("loading sources from {}", cfg.sources_path.display()))?;
    let filters = FilterSet::load_from(&cfg.filters_path)
        .with_context(|| format!("loading filters from {}", cfg.filters_path.display()))?;
    tracing::info!(
        sources = registry.len(),
        whitelist = filters.whitelist.len(),
        blacklist = filters.blacklist.len(),
        "sources and filters loaded"
    );

    let metrics = Metrics::init()?;
    let monitor = build_monitor(&cfg, registry, filters)?;

    tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run().await }
    });

    tokio::spawn({
        let monitor = monitor.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, stopping monitor");
                monitor.stop();
            }
        }
    });

    let router = api::router(monitor).merge(metrics.router());
    Ok(router.into())
}

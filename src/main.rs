use std::sync::Arc;
use anyhow::Context;
use farewatch::config::{AppConfig, RouteSelection};
use farewatch::fetch::CommandFetcher;
use farewatch::notify;
use farewatch::observability::metrics::register_metrics;
use farewatch::observability::tracing::init_tracing;
use farewatch::orchestrator::{ScrapeOrchestrator, Scheduler};
use farewatch::store::PriceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var("FAREWATCH_LOG_FORMAT").is_ok_and(|v| v == "json");
    init_tracing(json_logs);

    let env = std::env::var("FAREWATCH_ENV").unwrap_or_else(|_| "default".to_string());
    let config = AppConfig::load(&env).context("loading configuration")?;
    register_metrics().context("registering metrics")?;

    let (store, load_report) = PriceStore::open(&config.store.data_dir)
        .await
        .context("opening price store")?;
    for truncated in &load_report.truncated {
        tracing::warn!(
            "Log for route {} lost {} damaged bytes: {}",
            truncated.route_id,
            truncated.bytes,
            truncated.reason
        );
    }
    for skipped in &load_report.skipped {
        tracing::error!("Log for route {} is unreadable and will reject writes: {}", skipped.route_id, skipped.reason);
    }
    if load_report.dropped_records > 0 {
        tracing::warn!("Skipped {} stale or duplicate records on load", load_report.dropped_records);
    }

    let routes = config.select_routes(&RouteSelection::all());
    if routes.is_empty() {
        anyhow::bail!("no routes configured");
    }

    let orchestrator = Arc::new(ScrapeOrchestrator::from_config(store, &config));
    let fetcher = Arc::new(CommandFetcher::new(config.fetcher.clone()));
    let notifier = notify::from_config(&config.notifier);

    let scheduler = Scheduler::new(
        orchestrator,
        routes,
        fetcher,
        notifier,
        config.scheduler.interval(),
    );
    scheduler.start().await?;

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    tracing::info!("Shutdown requested");
    scheduler.stop().await?;

    Ok(())
}

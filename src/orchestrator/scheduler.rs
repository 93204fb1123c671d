use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use crate::config::route::Route;
use crate::error::{Error, Result};
use crate::interfaces::fetcher::Fetcher;
use crate::interfaces::notifier::Notifier;
use crate::orchestrator::cycle::{CycleReport, ScrapeOrchestrator};

/// Runs a cycle over the configured routes on a fixed interval.
///
/// The first cycle starts immediately. A cycle that overruns the interval delays
/// the next one instead of overlapping it. `stop` lets an in-flight cycle finish;
/// that wait is bounded by the cycle deadline.
pub struct Scheduler {
    orchestrator: Arc<ScrapeOrchestrator>,
    routes: Arc<Vec<Route>>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    reports: Arc<watch::Sender<Option<Arc<CycleReport>>>>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<ScrapeOrchestrator>,
        routes: Vec<Route>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        let (reports, _) = watch::channel(None);
        let (shutdown, _) = watch::channel(false);
        Scheduler {
            orchestrator,
            routes: Arc::new(routes),
            fetcher,
            notifier,
            interval,
            reports: Arc::new(reports),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Latest finished cycle report; `None` until the first cycle completes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<CycleReport>>> {
        self.reports.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub async fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(Error::ConfigError("scheduler already running".to_string()));
        }

        self.shutdown.send_replace(false);
        let mut shutdown = self.shutdown.subscribe();
        let orchestrator = self.orchestrator.clone();
        let routes = self.routes.clone();
        let fetcher = self.fetcher.clone();
        let notifier = self.notifier.clone();
        let reports = self.reports.clone();
        let period = self.interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = orchestrator
                            .run_cycle(&routes, fetcher.clone(), notifier.clone())
                            .await;
                        reports.send_replace(Some(Arc::new(report)));
                    }
                    _ = shutdown.changed() => break,
                }
            }
            tracing::info!("Scheduler loop exited");
        }));

        tracing::info!(
            "Scheduler started: {} routes every {:?}",
            self.routes.len(),
            self.interval
        );
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let Some(handle) = self.handle.lock().await.take() else {
            return Ok(());
        };
        self.shutdown.send_replace(true);
        handle
            .await
            .map_err(|e| Error::TaskAborted(format!("scheduler loop: {}", e)))?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }

    /// Run a single cycle now, outside the timer, and publish its report.
    pub async fn run_once(&self) -> Arc<CycleReport> {
        let report = Arc::new(
            self.orchestrator
                .run_cycle(&self.routes, self.fetcher.clone(), self.notifier.clone())
                .await,
        );
        self.reports.send_replace(Some(report.clone()));
        report
    }
}

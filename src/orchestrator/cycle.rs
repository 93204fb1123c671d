use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::Instrument;
use crate::alert::AlertEngine;
use crate::config::route::{Route, RouteKind};
use crate::config::{AppConfig, SchedulerConfig};
use crate::decoder;
use crate::error::{Error, Result};
use crate::events::alert::AlertEvent;
use crate::events::sample::PriceSample;
use crate::interfaces::fetcher::Fetcher;
use crate::interfaces::notifier::Notifier;
use crate::normalize::{cheapest_train_fare, normalize, RawQuote};
use crate::observability::metrics;
use crate::observability::tracing::{trace_cycle, trace_route};
use crate::store::PriceStore;
use crate::types::ids::{CycleId, RouteId};
use crate::types::timestamp::Timestamp;

/// What happened to a route that made it through the pipeline.
#[derive(Clone, Debug)]
pub struct RouteOutcome {
    pub route_id: RouteId,
    /// `None` when the source had no offer for the route.
    pub sample: Option<PriceSample>,
    pub inserted: bool,
    pub events: Vec<AlertEvent>,
    /// Delivery failure for `events`; the route still counts as succeeded.
    pub notify_error: Option<String>,
}

impl RouteOutcome {
    fn no_offer(route_id: RouteId) -> Self {
        RouteOutcome {
            route_id,
            sample: None,
            inserted: false,
            events: Vec::new(),
            notify_error: None,
        }
    }
}

#[derive(Debug)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub succeeded: Vec<RouteOutcome>,
    pub failed: BTreeMap<RouteId, Error>,
    /// Routes whose consecutive persistence failures reached the configured limit.
    pub degraded: Vec<RouteId>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.degraded.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &AlertEvent> {
        self.succeeded.iter().flat_map(|o| o.events.iter())
    }

    pub fn outcome(&self, route_id: &RouteId) -> Option<&RouteOutcome> {
        self.succeeded.iter().find(|o| o.route_id == *route_id)
    }
}

/// Everything one route task needs, cloned into the task.
#[derive(Clone)]
struct RouteContext {
    store: PriceStore,
    engine: AlertEngine,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    fetch_timeout: Duration,
    notify_timeout: Duration,
}

/// Drives one polling cycle: fetch, decode, normalize, store, evaluate, notify.
///
/// ## Failure isolation
/// - Each route runs as its own task; any error it returns lands in
///   `CycleReport::failed` under its id and other routes carry on.
/// - A panicking route task is recorded as `TaskAborted`.
/// - Routes still running at the cycle deadline are aborted and recorded as
///   `Timeout { stage: "cycle" }`. Store writes already under way finish on
///   their own task.
/// - A sample stored by such a write is evaluated when the next cycle sees the
///   same quote. Pending evaluations are kept in memory only, so a restart in
///   between loses them.
/// - Notifier failures are logged and kept on the outcome; they never fail a route.
pub struct ScrapeOrchestrator {
    store: PriceStore,
    engine: AlertEngine,
    config: SchedulerConfig,
    degraded_after_failures: u32,
}

impl ScrapeOrchestrator {
    pub fn new(store: PriceStore, engine: AlertEngine, config: SchedulerConfig, degraded_after_failures: u32) -> Self {
        ScrapeOrchestrator {
            store,
            engine,
            config,
            degraded_after_failures,
        }
    }

    pub fn from_config(store: PriceStore, config: &AppConfig) -> Self {
        Self::new(
            store,
            AlertEngine::new(config.alerts.clone()),
            config.scheduler.clone(),
            config.store.degraded_after_failures,
        )
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    pub async fn run_cycle(
        &self,
        routes: &[Route],
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> CycleReport {
        let cycle_id = CycleId::new();
        let span = trace_cycle(&cycle_id, routes.len());
        self.run_cycle_inner(cycle_id, routes, fetcher, notifier)
            .instrument(span)
            .await
    }

    async fn run_cycle_inner(
        &self,
        cycle_id: CycleId,
        routes: &[Route],
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> CycleReport {
        let started_at = Timestamp::now();
        let started = Instant::now();
        let cycle_deadline = self.config.cycle_deadline();
        let deadline = tokio::time::Instant::now() + cycle_deadline;

        tracing::info!("Starting cycle {} over {} routes", cycle_id, routes.len());

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let ctx = RouteContext {
            store: self.store.clone(),
            engine: self.engine.clone(),
            fetcher,
            notifier,
            fetch_timeout: self.config.fetch_timeout(),
            notify_timeout: self.config.notify_timeout(),
        };

        let mut tasks = JoinSet::new();
        let mut pending = BTreeSet::new();
        for route in routes {
            if !pending.insert(route.id.clone()) {
                tracing::warn!("Route {} listed twice, running it once", route.id);
                continue;
            }

            let span = trace_route(route);
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            let route = route.clone();
            tasks.spawn(
                async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => process_route(&ctx, &route).await,
                        Err(_) => Err(Error::TaskAborted("worker pool closed".to_string())),
                    };
                    (route.id, result)
                }
                .instrument(span),
            );
        }

        let mut succeeded = Vec::new();
        let mut failed = BTreeMap::new();
        let mut deadline_hit = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((route_id, result)))) => {
                    pending.remove(&route_id);
                    match result {
                        Ok(outcome) => succeeded.push(outcome),
                        Err(e) => {
                            tracing::warn!("Route {} failed: {}", route_id, e);
                            failed.insert(route_id, e);
                        }
                    }
                }
                Ok(Some(Err(join_error))) => {
                    tracing::error!("Route task ended abnormally: {}", join_error);
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    tracing::warn!(
                        "Cycle deadline of {:?} reached with {} routes in flight",
                        cycle_deadline,
                        pending.len()
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        for route_id in pending {
            let error = if deadline_hit {
                Error::Timeout {
                    stage: "cycle",
                    after_ms: cycle_deadline.as_millis() as u64,
                }
            } else {
                Error::TaskAborted(format!("route {} task panicked", route_id))
            };
            failed.insert(route_id, error);
        }

        let degraded: Vec<RouteId> = routes
            .iter()
            .map(|r| &r.id)
            .filter(|id| self.store.failure_streak(id) >= self.degraded_after_failures)
            .cloned()
            .collect();
        for route_id in &degraded {
            tracing::error!(
                "Route {} is degraded: {} consecutive persistence failures",
                route_id,
                self.store.failure_streak(route_id)
            );
        }

        metrics::CYCLES_COMPLETED.inc();
        metrics::CYCLE_DURATION.observe(started.elapsed().as_secs_f64());
        metrics::ROUTE_SUCCESSES.inc_by(succeeded.len() as u64);
        for error in failed.values() {
            metrics::ROUTE_FAILURES.with_label_values(&[error.category().as_str()]).inc();
        }
        metrics::DEGRADED_ROUTES.set(degraded.len() as i64);

        let report = CycleReport {
            cycle_id,
            started_at,
            finished_at: Timestamp::now(),
            succeeded,
            failed,
            degraded,
        };

        tracing::info!(
            "Cycle {} finished in {:?}: {} succeeded, {} failed, {} alerts",
            report.cycle_id,
            started.elapsed(),
            report.succeeded.len(),
            report.failed.len(),
            report.events().count()
        );

        report
    }
}

async fn process_route(ctx: &RouteContext, route: &Route) -> Result<RouteOutcome> {
    let response = timeout(ctx.fetch_timeout, ctx.fetcher.fetch(route))
        .await
        .map_err(|_| Error::Timeout {
            stage: "fetch",
            after_ms: ctx.fetch_timeout.as_millis() as u64,
        })??;

    let quote = match route.kind {
        RouteKind::Flight => decoder::extract_from_response(response, route.cabin())?.map(RawQuote::Flight),
        RouteKind::Train => cheapest_train_fare(response)?.map(RawQuote::Train),
    };
    let Some(quote) = quote else {
        tracing::info!("No offer found for route {}", route.id);
        return Ok(RouteOutcome::no_offer(route.id.clone()));
    };

    let sample = normalize(&quote, route, Timestamp::now(), ctx.fetcher.source_id())?;
    let stored = ctx.store.append(sample.clone()).await?;

    let late = if stored.latest_unevaluated { stored.previous.split_last() } else { None };
    let (evaluated, previous) = if stored.inserted {
        metrics::SAMPLES_INSERTED.inc();
        (sample.clone(), stored.previous)
    } else if let Some((latest, before)) = late {
        metrics::SAMPLES_DEDUPLICATED.inc();
        tracing::info!(
            "Evaluating sample stored at {} for route {} after an interrupted cycle",
            latest.observed_at,
            route.id
        );
        (latest, before)
    } else {
        metrics::SAMPLES_DEDUPLICATED.inc();
        tracing::debug!("Route {} unchanged at {} {}", route.id, sample.price, sample.currency);
        return Ok(RouteOutcome {
            route_id: route.id.clone(),
            sample: Some(sample),
            inserted: false,
            events: Vec::new(),
            notify_error: None,
        });
    };

    let events = ctx.engine.evaluate(&evaluated, &previous, route);
    ctx.store.mark_evaluated(&route.id, evaluated.observed_at);
    for event in &events {
        metrics::ALERTS_EMITTED.with_label_values(&[event.rule.as_str()]).inc();
    }

    let notify_error = if events.is_empty() {
        None
    } else {
        match timeout(ctx.notify_timeout, ctx.notifier.send(&events)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("notifier timed out after {:?}", ctx.notify_timeout)),
        }
    };
    if let Some(reason) = &notify_error {
        tracing::warn!("Could not deliver {} alerts for route {}: {}", events.len(), route.id, reason);
    }

    Ok(RouteOutcome {
        route_id: route.id.clone(),
        sample: Some(sample),
        inserted: stored.inserted,
        events,
        notify_error,
    })
}

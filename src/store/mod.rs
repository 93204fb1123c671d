pub mod history;
pub mod log;
pub mod record;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use dashmap::DashMap;
use im::Vector;
use tokio::fs as async_fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use crate::error::{Error, Result};
use crate::events::sample::PriceSample;
use crate::observability::metrics;
use crate::types::ids::RouteId;
use crate::types::timestamp::Timestamp;

pub use history::History;
use self::log::RouteLog;
use self::record::LogRecord;

const LOG_EXTENSION: &str = "log";

/// Outcome of a single append.
#[derive(Clone, Debug)]
pub struct StoreResult {
    /// False when the sample repeated the latest stored quote.
    pub inserted: bool,
    /// History as it stood before this sample.
    pub previous: History,
    /// The newest sample in `previous` was stored but never passed to
    /// `mark_evaluated`.
    pub latest_unevaluated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TruncatedLog {
    pub route_id: RouteId,
    pub bytes: u64,
    pub reason: String,
}

/// A route log that could not be read at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedLog {
    pub route_id: RouteId,
    pub reason: String,
}

/// What `PriceStore::open` found on disk.
#[derive(Clone, Debug, Default)]
pub struct LoadReport {
    pub routes_loaded: usize,
    pub samples_loaded: usize,
    /// Logs whose damaged tail was cut off during load.
    pub truncated: Vec<TruncatedLog>,
    /// Logs that failed to load. Their routes reject appends until restart.
    pub skipped: Vec<SkippedLog>,
    /// Intact records dropped because they repeated the previous quote or
    /// went back in time.
    pub dropped_records: usize,
}

impl LoadReport {
    pub fn has_warnings(&self) -> bool {
        !self.truncated.is_empty() || !self.skipped.is_empty() || self.dropped_records > 0
    }
}

struct RouteSeries {
    log: RouteLog,
    samples: Vector<PriceSample>,
}

struct StoreInner {
    data_dir: PathBuf,
    series: DashMap<RouteId, Arc<Mutex<RouteSeries>>>,
    failure_streaks: DashMap<RouteId, u32>,
    /// Stamp of the last inserted sample per route until it is marked evaluated.
    unevaluated: DashMap<RouteId, Timestamp>,
}

/// Durable per-route price history.
///
/// ## Concurrency
/// - **Writers**: one at a time per route, serialized by the route's mutex.
///   Different routes never contend.
/// - **Readers**: `latest` and `history` take the same mutex briefly and return
///   snapshots that stay valid after it is released.
/// - **Cancellation**: the write itself runs on a spawned task that owns the
///   route lock, so dropping an `append` future never leaves a partial frame.
///
/// ## Invariants
/// - Consecutive samples never carry the same `(price, currency)`.
/// - `observed_at` strictly increases along a route's history.
#[derive(Clone)]
pub struct PriceStore {
    inner: Arc<StoreInner>,
}

impl PriceStore {
    /// Load every route log under `data_dir`, creating the directory if needed.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<(Self, LoadReport)> {
        let data_dir = data_dir.as_ref().to_path_buf();
        async_fs::create_dir_all(&data_dir).await?;

        let series = DashMap::new();
        let mut report = LoadReport::default();

        let mut entries = async_fs::read_dir(&data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                tracing::warn!("Removing leftover temp file {:?}", path);
                async_fs::remove_file(&path).await?;
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let route_id = RouteId::new(stem);
            if !route_id.is_file_safe() {
                tracing::warn!("Skipping log with unexpected name {:?}", path);
                continue;
            }

            let (log, loaded) = match RouteLog::load(route_id.clone(), path.clone()).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!("Could not load log {:?}, route {} will reject writes: {}", path, route_id, e);
                    report.skipped.push(SkippedLog {
                        route_id: route_id.clone(),
                        reason: e.to_string(),
                    });
                    let log = RouteLog::unavailable(route_id.clone(), path, e.to_string());
                    series.insert(route_id, Arc::new(Mutex::new(RouteSeries { log, samples: Vector::new() })));
                    continue;
                }
            };
            if loaded.truncated_bytes > 0 {
                metrics::LOG_RECORDS_TRUNCATED.inc();
                report.truncated.push(TruncatedLog {
                    route_id: route_id.clone(),
                    bytes: loaded.truncated_bytes,
                    reason: loaded.reason.unwrap_or_default(),
                });
            }

            let total = loaded.records.len();
            let samples = rebuild(&route_id, loaded.records);
            report.dropped_records += total - samples.len();
            report.samples_loaded += samples.len();
            report.routes_loaded += 1;

            series.insert(route_id, Arc::new(Mutex::new(RouteSeries { log, samples })));
        }

        tracing::info!(
            "Opened price store at {:?}: {} routes, {} samples, {} truncated logs, {} skipped logs",
            data_dir,
            report.routes_loaded,
            report.samples_loaded,
            report.truncated.len(),
            report.skipped.len()
        );

        let store = PriceStore {
            inner: Arc::new(StoreInner {
                data_dir,
                series,
                failure_streaks: DashMap::new(),
                unevaluated: DashMap::new(),
            }),
        };
        Ok((store, report))
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.data_dir
    }

    /// Append `sample` durably unless it repeats the latest quote.
    pub async fn append(&self, sample: PriceSample) -> Result<StoreResult> {
        let series = self.series(&sample.route_id);
        let guard = series.lock_owned().await;

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.append_locked(guard, sample).await })
            .await
            .map_err(|e| Error::TaskAborted(format!("store append: {}", e)))?
    }

    pub async fn latest(&self, route_id: &RouteId) -> Option<PriceSample> {
        let series = self.inner.series.get(route_id).map(|s| s.value().clone())?;
        let guard = series.lock().await;
        guard.samples.last().cloned()
    }

    /// Snapshot of a route's history, optionally from `since` (inclusive) onwards.
    pub async fn history(&self, route_id: &RouteId, since: Option<Timestamp>) -> History {
        let Some(series) = self.inner.series.get(route_id).map(|s| s.value().clone()) else {
            return History::default();
        };
        let history = History::new(series.lock().await.samples.clone());
        match since {
            Some(since) => history.since(since),
            None => history,
        }
    }

    /// Rewrite a route's log from its in-memory history. Returns the record count.
    pub async fn compact(&self, route_id: &RouteId) -> Result<usize> {
        let Some(series) = self.inner.series.get(route_id).map(|s| s.value().clone()) else {
            return Ok(0);
        };
        let mut guard = series.lock().await;
        let records: Vec<LogRecord> = guard.samples.iter().map(LogRecord::from).collect();
        guard.log.rewrite(&records).await?;
        Ok(records.len())
    }

    /// Record that alerts for the sample stamped `observed_at` have been evaluated.
    pub fn mark_evaluated(&self, route_id: &RouteId, observed_at: Timestamp) {
        self.inner.unevaluated.remove_if(route_id, |_, at| *at == observed_at);
    }

    /// Consecutive failed appends for a route; zero after any successful append.
    pub fn failure_streak(&self, route_id: &RouteId) -> u32 {
        self.inner.failure_streaks.get(route_id).map(|v| *v).unwrap_or(0)
    }

    fn series(&self, route_id: &RouteId) -> Arc<Mutex<RouteSeries>> {
        self.inner
            .series
            .entry(route_id.clone())
            .or_insert_with(|| {
                let path = self.inner.log_path(route_id);
                Arc::new(Mutex::new(RouteSeries {
                    log: RouteLog::new(route_id.clone(), path),
                    samples: Vector::new(),
                }))
            })
            .value()
            .clone()
    }
}

impl StoreInner {
    fn log_path(&self, route_id: &RouteId) -> PathBuf {
        self.data_dir.join(format!("{}.{}", route_id, LOG_EXTENSION))
    }

    async fn append_locked(&self, mut series: OwnedMutexGuard<RouteSeries>, sample: PriceSample) -> Result<StoreResult> {
        let previous = History::new(series.samples.clone());

        if let Some(latest) = series.samples.last() {
            if latest.same_quote(&sample) {
                self.failure_streaks.remove(&sample.route_id);
                let latest_unevaluated = self
                    .unevaluated
                    .get(&sample.route_id)
                    .is_some_and(|at| *at == latest.observed_at);
                return Ok(StoreResult { inserted: false, previous, latest_unevaluated });
            }
            if sample.observed_at <= latest.observed_at {
                return Err(Error::OutOfOrderSample {
                    route_id: sample.route_id.clone(),
                    latest: latest.observed_at,
                    got: sample.observed_at,
                });
            }
        }

        if !sample.route_id.is_file_safe() {
            return Err(Error::StorePersistence {
                route_id: sample.route_id.clone(),
                reason: "route id is not usable as a file name".to_string(),
            });
        }

        if let Err(e) = series.log.append(&LogRecord::from(&sample)).await {
            let mut streak = self.failure_streaks.entry(sample.route_id.clone()).or_insert(0);
            *streak += 1;
            tracing::error!(
                "Append failed for route {} ({} consecutive): {}",
                sample.route_id,
                *streak,
                e
            );
            return Err(e);
        }

        self.failure_streaks.remove(&sample.route_id);
        self.unevaluated.insert(sample.route_id.clone(), sample.observed_at);
        tracing::debug!(
            "Stored {} {} for route {} at {}",
            sample.price,
            sample.currency,
            sample.route_id,
            sample.observed_at
        );
        series.samples.push_back(sample);

        Ok(StoreResult { inserted: true, previous, latest_unevaluated: false })
    }
}

/// Re-establish history invariants over records read back from disk.
fn rebuild(route_id: &RouteId, records: Vec<LogRecord>) -> Vector<PriceSample> {
    let mut samples: Vector<PriceSample> = Vector::new();
    for record in records {
        if record.route_id != *route_id {
            tracing::warn!("Dropping record for route {} found in log of {}", record.route_id, route_id);
            continue;
        }
        let sample = record.into_sample();
        if let Some(last) = samples.last() {
            if last.same_quote(&sample) || sample.observed_at <= last.observed_at {
                continue;
            }
        }
        samples.push_back(sample);
    }
    samples
}

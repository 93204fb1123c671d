use std::path::PathBuf;
use std::time::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod loader;
pub mod route;

pub use loader::AppConfig;
pub use route::{CabinClass, PriceBand, Route, RouteKind, RouteSelection};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub cycle_deadline_secs: u64,
    pub max_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub notify_timeout_secs: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_secs(self.cycle_deadline_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval_secs: 7200,        // 2 hours
            cycle_deadline_secs: 1800,  // 30 minutes
            max_concurrency: 4,
            fetch_timeout_secs: 300,
            notify_timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub degraded_after_failures: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from("data"),
            degraded_after_failures: 3,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    pub drop_threshold_pct: Decimal,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            drop_threshold_pct: Decimal::TEN,  // 10%
        }
    }
}

/// External browser driver invoked once per route.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub program: String,
    pub args: Vec<String>,
    pub source_id: String,
    /// Weeks past the next Monday to search flights for.
    pub week_offset: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            program: "farewatch-fetch".to_string(),
            args: Vec::new(),
            source_id: "browser".to_string(),
            week_offset: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    Log,
    JsonLines { path: PathBuf },
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig::Log
    }
}

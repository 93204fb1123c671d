use std::collections::HashSet;
use std::path::Path;
use rust_decimal::Decimal;
use crate::config::route::{Route, RouteKind, RouteSelection};
use crate::config::*;
use crate::error::{Error, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("FAREWATCH").separator("__"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        Self::finish(config)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self> {
        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_concurrency == 0 {
            return Err(Error::ConfigError("scheduler.max_concurrency must be at least 1".into()));
        }
        if self.scheduler.cycle_deadline_secs == 0 || self.scheduler.fetch_timeout_secs == 0 {
            return Err(Error::ConfigError("scheduler deadlines must be non-zero".into()));
        }
        check_threshold("alerts.drop_threshold_pct", self.alerts.drop_threshold_pct)?;

        let mut seen = HashSet::new();
        for route in &self.routes {
            if !route.id.is_file_safe() {
                return Err(Error::ConfigError(format!(
                    "route id {:?} must be non-empty and use only [A-Za-z0-9_-]",
                    route.id.as_str()
                )));
            }
            if !seen.insert(route.id.clone()) {
                return Err(Error::ConfigError(format!("duplicate route id {}", route.id)));
            }
            if route.kind == RouteKind::Train && route.cabin_class.is_some() {
                return Err(Error::ConfigError(format!(
                    "route {}: cabin_class only applies to flights",
                    route.id
                )));
            }
            if let Some(pct) = route.drop_threshold_pct {
                check_threshold(&format!("routes.{}.drop_threshold_pct", route.id), pct)?;
            }
            if let Some(band) = route.plausible_range {
                if band.min_minor > band.max_minor {
                    return Err(Error::ConfigError(format!(
                        "route {}: plausible_range min exceeds max",
                        route.id
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn select_routes(&self, selection: &RouteSelection) -> Vec<Route> {
        selection.apply(&self.routes)
    }
}

fn check_threshold(name: &str, pct: Decimal) -> Result<()> {
    if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(Error::ConfigError(format!("{} must be in (0, 100], got {}", name, pct)));
    }
    Ok(())
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::types::ids::RouteId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Flight,
    Train,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Flight => "flight",
            RouteKind::Train => "train",
        }
    }
}

/// Flight fare tier. The discriminator is the value the flight payload
/// carries in the itinerary's cabin field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CabinClass {
    #[serde(alias = "economy")]
    Economy,
    #[serde(alias = "business")]
    Business,
}

impl CabinClass {
    pub fn discriminator(&self) -> u64 {
        match self {
            CabinClass::Economy => 1,
            CabinClass::Business => 3,
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CabinClass::Economy => f.write_str("ECONOMY"),
            CabinClass::Business => f.write_str("BUSINESS"),
        }
    }
}

/// Inclusive band of prices (minor units) a source can plausibly report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min_minor: i64,
    pub max_minor: i64,
}

impl PriceBand {
    pub fn contains(&self, minor_units: i64) -> bool {
        minor_units >= self.min_minor && minor_units <= self.max_minor
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub kind: RouteKind,
    pub origin_id: String,
    pub destination_id: String,
    pub label: String,
    #[serde(default)]
    pub cabin_class: Option<CabinClass>,
    #[serde(default)]
    pub drop_threshold_pct: Option<Decimal>,
    #[serde(default)]
    pub target_price_minor: Option<i64>,
    #[serde(default)]
    pub plausible_range: Option<PriceBand>,
}

impl Route {
    pub fn flight(id: &str, origin_id: &str, destination_id: &str, cabin_class: CabinClass) -> Self {
        Route {
            id: RouteId::from(id),
            kind: RouteKind::Flight,
            origin_id: origin_id.to_string(),
            destination_id: destination_id.to_string(),
            label: format!("{} -> {}", origin_id, destination_id),
            cabin_class: Some(cabin_class),
            drop_threshold_pct: None,
            target_price_minor: None,
            plausible_range: None,
        }
    }

    pub fn train(id: &str, origin_id: &str, destination_id: &str) -> Self {
        Route {
            id: RouteId::from(id),
            kind: RouteKind::Train,
            origin_id: origin_id.to_string(),
            destination_id: destination_id.to_string(),
            label: format!("{} -> {}", origin_id, destination_id),
            cabin_class: None,
            drop_threshold_pct: None,
            target_price_minor: None,
            plausible_range: None,
        }
    }

    /// Cabin used for extraction. Flights without an explicit class track economy.
    pub fn cabin(&self) -> CabinClass {
        self.cabin_class.unwrap_or(CabinClass::Economy)
    }
}

/// Narrows the configured routes for a cycle (single route, flights or trains only).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteSelection {
    pub route_id: Option<RouteId>,
    pub kind: Option<RouteKind>,
}

impl RouteSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(route_id: impl Into<RouteId>) -> Self {
        RouteSelection {
            route_id: Some(route_id.into()),
            kind: None,
        }
    }

    pub fn kind(kind: RouteKind) -> Self {
        RouteSelection {
            route_id: None,
            kind: Some(kind),
        }
    }

    pub fn matches(&self, route: &Route) -> bool {
        self.route_id.as_ref().is_none_or(|id| *id == route.id)
            && self.kind.is_none_or(|kind| kind == route.kind)
    }

    pub fn apply(&self, routes: &[Route]) -> Vec<Route> {
        routes.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

impl From<&str> for RouteSelection {
    fn from(route_id: &str) -> Self {
        RouteSelection::only(route_id)
    }
}

use rust_decimal::Decimal;
use crate::config::route::Route;
use crate::config::AlertConfig;
use crate::events::alert::{AlertEvent, AlertRule};
use crate::events::sample::PriceSample;
use crate::store::History;
use crate::types::ids::AlertId;
use crate::types::price::Price;

/// Decides which alerts a freshly stored sample raises.
///
/// Rules run in a fixed order and every one that matches is emitted:
/// 1. `FIRST_SEEN`: nothing stored for the route yet.
/// 2. `ALL_TIME_LOW`: cheaper than every earlier sample in the same currency.
/// 3. `DROP_THRESHOLD`: fell by at least the threshold since the previous sample.
/// 4. `TARGET_PRICE`: crossed down through the route's target price.
///
/// Evaluation is pure. Malformed history (zero or negative baselines, currency
/// switches) makes a rule skip rather than fail.
#[derive(Clone, Debug)]
pub struct AlertEngine {
    config: AlertConfig,
}

impl AlertEngine {
    pub fn new(config: AlertConfig) -> Self {
        AlertEngine { config }
    }

    /// `history` is the route's history before `sample` was stored.
    pub fn evaluate(&self, sample: &PriceSample, history: &History, route: &Route) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        if history.is_empty() {
            events.push(self.event(sample, AlertRule::FirstSeen, sample.price, Decimal::ZERO));
            return events;
        }

        // Rule 2: all-time low against prior samples in the same currency
        let prior_min = history
            .iter()
            .filter(|s| s.currency == sample.currency)
            .map(|s| s.price)
            .min();
        if let Some(min) = prior_min {
            if sample.price < min {
                if let Some(delta) = drop_pct(min, sample.price) {
                    events.push(self.event(sample, AlertRule::AllTimeLow, min, delta));
                }
            }
        }

        let Some(previous) = history.last().filter(|p| p.currency == sample.currency) else {
            return events;
        };

        // Rule 3: single-step drop
        let threshold = route.drop_threshold_pct.unwrap_or(self.config.drop_threshold_pct);
        if let Some(delta) = drop_pct(previous.price, sample.price) {
            if delta > Decimal::ZERO && delta >= threshold {
                events.push(self.event(sample, AlertRule::DropThreshold, previous.price, delta.round_dp(2)));
            }
        }

        // Rule 4: target crossing
        if let Some(target) = route.target_price_minor.map(Price::from_minor) {
            if sample.price <= target && previous.price > target {
                if let Some(delta) = drop_pct(previous.price, sample.price) {
                    events.push(self.event(sample, AlertRule::TargetPrice, previous.price, delta.round_dp(2)));
                }
            }
        }

        events
    }

    fn event(&self, sample: &PriceSample, rule: AlertRule, previous_price: Price, delta_pct: Decimal) -> AlertEvent {
        AlertEvent {
            alert_id: AlertId::new(),
            route_id: sample.route_id.clone(),
            rule,
            previous_price,
            new_price: sample.price,
            currency: sample.currency,
            delta_pct: delta_pct.round_dp(2),
            triggered_at: sample.observed_at,
        }
    }
}

/// Percentage fall from `from` to `to`; negative for rises, `None` without a positive baseline.
fn drop_pct(from: Price, to: Price) -> Option<Decimal> {
    if !from.is_positive() {
        return None;
    }
    let from = Decimal::from(from.minor_units());
    let to = Decimal::from(to.minor_units());
    (from - to)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .checked_div(from)
}

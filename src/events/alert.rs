use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::types::currency::Currency;
use crate::types::ids::{AlertId, RouteId};
use crate::types::price::Price;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_id: AlertId,
    pub route_id: RouteId,
    pub rule: AlertRule,
    pub previous_price: Price,
    pub new_price: Price,
    pub currency: Currency,
    pub delta_pct: Decimal,
    pub triggered_at: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertRule {
    FirstSeen,
    AllTimeLow,
    DropThreshold,
    TargetPrice,
}

impl AlertRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertRule::FirstSeen => "FIRST_SEEN",
            AlertRule::AllTimeLow => "ALL_TIME_LOW",
            AlertRule::DropThreshold => "DROP_THRESHOLD",
            AlertRule::TargetPrice => "TARGET_PRICE",
        }
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} {} -> {} {} ({}%)",
            self.rule.as_str(),
            self.route_id,
            self.previous_price,
            self.currency,
            self.new_price,
            self.currency,
            self.delta_pct
        )
    }
}

use serde::{Deserialize, Serialize};
use crate::types::currency::Currency;
use crate::types::ids::RouteId;
use crate::types::price::Price;
use crate::types::timestamp::Timestamp;

/// One normalized price observation for a route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub route_id: RouteId,
    pub observed_at: Timestamp,
    pub price: Price,
    pub currency: Currency,
    pub raw_source_tag: String,
}

impl PriceSample {
    /// Two samples carry the same quote when price and currency match.
    pub fn same_quote(&self, other: &PriceSample) -> bool {
        self.price == other.price && self.currency == other.currency
    }
}

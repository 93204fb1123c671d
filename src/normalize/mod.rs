use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use crate::config::route::Route;
use crate::error::{Error, Result};
use crate::events::sample::PriceSample;
use crate::interfaces::fetcher::RawResponse;
use crate::types::currency::Currency;
use crate::types::money::Money;
use crate::types::price::Price;
use crate::types::timestamp::Timestamp;

/// Source output before normalization.
#[derive(Clone, Debug, PartialEq)]
pub enum RawQuote {
    Flight(Money),
    Train(TrainFare),
}

/// One fare as emitted by the train scraper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainFare {
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
}

/// Cheapest fare out of the train scraper's JSON list, `None` when it found nothing.
pub fn cheapest_train_fare(response: RawResponse) -> Result<Option<TrainFare>> {
    let text = response.into_text()
        .map_err(|e| Error::DeserializationError(format!("train output is not UTF-8: {}", e)))?;
    let fares: Vec<TrainFare> = serde_json::from_str(&text)
        .map_err(|e| Error::DeserializationError(e.to_string()))?;

    Ok(fares.into_iter().min_by(|a, b| a.amount.cmp(&b.amount)))
}

/// Turn a source quote into a canonical sample stamped `observed_at`.
pub fn normalize(raw: &RawQuote, route: &Route, observed_at: Timestamp, source_id: &str) -> Result<PriceSample> {
    let (minor_units, currency, tag) = match raw {
        RawQuote::Flight(money) => {
            let currency: Currency = money.currency.parse()?;
            (money.minor_units, currency, format!("{}/flight/{}", source_id, route.cabin()))
        }
        RawQuote::Train(fare) => {
            let currency: Currency = fare.currency.parse()?;
            let tag = if fare.service.is_empty() {
                format!("{}/train", source_id)
            } else {
                format!("{}/train/{}", source_id, fare.service)
            };
            (to_minor_units(fare.amount, currency)?, currency, tag)
        }
    };

    if minor_units <= 0 {
        return Err(Error::NonPositivePrice(minor_units));
    }

    if let Some(band) = route.plausible_range {
        if !band.contains(minor_units) {
            return Err(Error::ImplausiblePrice {
                price: minor_units,
                min: band.min_minor,
                max: band.max_minor,
            });
        }
    }

    Ok(PriceSample {
        route_id: route.id.clone(),
        observed_at,
        price: Price::from_minor(minor_units),
        currency,
        raw_source_tag: tag,
    })
}

fn to_minor_units(amount: Decimal, currency: Currency) -> Result<i64> {
    let digits = currency.minor_digits();
    let scale = Decimal::from(10i64.pow(digits));
    amount
        .round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(scale)
        .and_then(|scaled| scaled.to_i64())
        .ok_or_else(|| Error::DeserializationError(format!("amount {} out of range", amount)))
}

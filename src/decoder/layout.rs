//! Field numbers of the flight results payload.
//!
//! The upstream format has no published schema; these numbers are the whole
//! contract. Anything not listed here is skipped.

use crate::config::route::CabinClass;
use crate::decoder::wire::{DecodedField, WireType};
use crate::error::{Error, Result};
use crate::types::money::Money;

/// Deepest nesting expanded into messages; the price sits at depth 3.
pub const MAX_DEPTH: usize = 32;

/// root.2: result container (may repeat)
pub const RESULTS: u32 = 2;
/// root.4: payload-wide currency code
pub const PAYLOAD_CURRENCY: u32 = 4;
/// container.1: one itinerary (repeated)
pub const ITINERARY: u32 = 1;
/// itinerary.9: cabin discriminator, 1 = Economy, 3 = Business
pub const CABIN_CLASS: u32 = 9;
/// itinerary.5: price message
pub const PRICE: u32 = 5;
/// price.1: amount in minor units
pub const PRICE_UNITS: u32 = 1;
/// price.3: currency code overriding the payload currency
pub const PRICE_CURRENCY: u32 = 3;

/// Cheapest itinerary price for the requested cabin.
///
/// Minimums are kept per currency. When itineraries disagree on currency the
/// payload currency wins, otherwise the currency seen first.
///
/// `Ok(None)` means the payload simply has no offer for that cabin.
/// Errors are reserved for structural damage on the fields we rely on.
pub fn extract_price(root: &DecodedField, cabin: CabinClass) -> Result<Option<Money>> {
    let root_fields = root.fields()
        .ok_or_else(|| Error::malformed(0, "payload root is not a message"))?;
    let payload_currency = root_fields.iter()
        .find(|f| f.tag == PAYLOAD_CURRENCY)
        .and_then(|f| f.as_str());

    // Insertion order doubles as first-seen order.
    let mut cheapest: Vec<Money> = Vec::new();

    for container in root.children(RESULTS) {
        if container.fields().is_none() {
            return Err(Error::malformed(0, format!("field {} is not a message", RESULTS)));
        }

        for itinerary in container.children(ITINERARY) {
            // Unknown shapes under the itinerary tag are forward-compatible noise.
            let Some(discriminator) = itinerary.child(CABIN_CLASS).and_then(|f| f.as_integer()) else {
                continue;
            };
            if discriminator != cabin.discriminator() {
                continue;
            }

            let Some(money) = read_price(itinerary, payload_currency)? else {
                continue;
            };

            match cheapest.iter_mut().find(|m| m.currency == money.currency) {
                Some(current) if money.minor_units < current.minor_units => *current = money,
                Some(_) => {}
                None => cheapest.push(money),
            }
        }
    }

    if cheapest.len() > 1 {
        tracing::debug!(
            "Itineraries for {:?} priced in {} currencies, preferring {:?}",
            cabin,
            cheapest.len(),
            payload_currency
        );
    }
    let preferred = payload_currency
        .and_then(|code| cheapest.iter().position(|m| m.currency == code))
        .unwrap_or(0);

    if cheapest.is_empty() {
        return Ok(None);
    }
    Ok(Some(cheapest.swap_remove(preferred)))
}

fn read_price(itinerary: &DecodedField, payload_currency: Option<&str>) -> Result<Option<Money>> {
    let Some(price) = itinerary.child(PRICE) else {
        return Ok(None);
    };
    if price.fields().is_none() {
        return Err(Error::malformed(0, format!("itinerary field {} is not a message", PRICE)));
    }

    let Some(units) = price.child(PRICE_UNITS) else {
        return Ok(None);
    };
    if units.wire_type != WireType::Varint {
        return Err(Error::malformed(0, format!("price field {} is not a varint", PRICE_UNITS)));
    }
    let minor_units = units.as_integer()
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| Error::malformed(0, "price amount out of range"))?;

    let currency = price.child(PRICE_CURRENCY)
        .and_then(|f| f.as_str())
        .or(payload_currency)
        .ok_or_else(|| Error::malformed(0, "itinerary price has no currency"))?;

    Ok(Some(Money::new(minor_units, currency)))
}

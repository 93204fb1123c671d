//! Flight payload decoding tests.

mod common;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use common::{flight_payload, itinerary};
use farewatch::config::route::CabinClass;
use farewatch::decoder::{decode, extract_from_response, extract_price};
use farewatch::error::Error;
use farewatch::interfaces::fetcher::RawResponse;
use proptest::prelude::*;

#[test]
fn test_cheapest_itinerary_for_cabin_is_selected() {
    let payload = flight_payload(
        &[
            itinerary(1, 89_900, None),
            itinerary(3, 219_900, None),
            itinerary(1, 79_900, None),
            itinerary(3, 199_000, None),
        ],
        "EUR",
    );
    let root = decode(&payload).unwrap();

    let economy = extract_price(&root, CabinClass::Economy).unwrap().unwrap();
    assert_eq!(economy.minor_units, 79_900);
    assert_eq!(economy.currency, "EUR");

    let business = extract_price(&root, CabinClass::Business).unwrap().unwrap();
    assert_eq!(business.minor_units, 199_000);
}

#[test]
fn test_missing_cabin_is_no_offer_not_error() {
    let payload = flight_payload(&[itinerary(1, 89_900, None)], "EUR");
    let root = decode(&payload).unwrap();
    assert_eq!(extract_price(&root, CabinClass::Business).unwrap(), None);
}

#[test]
fn test_itinerary_currency_overrides_payload_currency() {
    let payload = flight_payload(&[itinerary(1, 1_500_000, Some("MXN"))], "EUR");
    let money = extract_price(&decode(&payload).unwrap(), CabinClass::Economy).unwrap().unwrap();
    assert_eq!(money.currency, "MXN");
}

#[test]
fn test_mixed_currencies_prefer_payload_currency() {
    let payload = flight_payload(
        &[
            itinerary(1, 50, Some("USD")),
            itinerary(1, 100, Some("EUR")),
            itinerary(1, 90, None),
        ],
        "EUR",
    );
    let money = extract_price(&decode(&payload).unwrap(), CabinClass::Economy).unwrap().unwrap();
    assert_eq!(money.minor_units, 90);
    assert_eq!(money.currency, "EUR");
}

#[test]
fn test_mixed_currencies_without_payload_match_use_first_seen() {
    let payload = flight_payload(
        &[
            itinerary(1, 120_000, Some("USD")),
            itinerary(1, 2_000_000, Some("MXN")),
            itinerary(1, 110_000, Some("USD")),
        ],
        "EUR",
    );
    let money = extract_price(&decode(&payload).unwrap(), CabinClass::Economy).unwrap().unwrap();
    assert_eq!(money.minor_units, 110_000);
    assert_eq!(money.currency, "USD");
}

#[test]
fn test_deeply_nested_payload_decodes_without_overflow() {
    // field 1 { field 1 { ... { field 1 = 1 } ... } }, 20k levels, built back to front
    let mut reversed = vec![0x01, 0x08];
    for _ in 0..20_000 {
        let mut len = reversed.len() as u64;
        let mut prefix = Vec::new();
        while len >= 0x80 {
            prefix.push((len as u8 & 0x7f) | 0x80);
            len >>= 7;
        }
        prefix.push(len as u8);
        reversed.extend(prefix.iter().rev());
        reversed.push(0x0a);
    }
    let body: Vec<u8> = reversed.into_iter().rev().collect();

    let root = decode(&body).unwrap();
    assert_eq!(extract_price(&root, CabinClass::Economy).unwrap(), None);

    let mut levels = 0;
    let mut node = root.child(1);
    while let Some(field) = node {
        levels += 1;
        node = field.child(1);
    }
    assert!(levels <= 40, "expanded {} levels", levels);
}

#[test]
fn test_truncated_payload_is_malformed() {
    let payload = flight_payload(&[itinerary(1, 89_900, None)], "EUR");
    let result = decode(&payload[..payload.len() - 7]);
    assert!(matches!(result, Err(Error::MalformedPayload { .. })));
}

#[test]
fn test_base64_text_responses_are_accepted() {
    let payload = flight_payload(&[itinerary(1, 45_000, None)], "EUR");

    for text in [URL_SAFE_NO_PAD.encode(&payload), STANDARD.encode(&payload)] {
        let money = extract_from_response(RawResponse::Text(text), CabinClass::Economy)
            .unwrap()
            .unwrap();
        assert_eq!(money.minor_units, 45_000);
    }

    let result = extract_from_response(RawResponse::Text("not a payload!".to_string()), CabinClass::Economy);
    assert!(matches!(result, Err(Error::MalformedPayload { .. })));
}

proptest! {
    #[test]
    fn prop_extracted_price_is_cabin_minimum(
        offers in prop::collection::vec((prop_oneof![Just(1u64), Just(3u64)], 1u64..50_000_000), 0..12)
    ) {
        let itineraries: Vec<Vec<u8>> = offers.iter().map(|(cabin, units)| itinerary(*cabin, *units, None)).collect();
        let root = decode(&flight_payload(&itineraries, "EUR")).unwrap();

        for cabin in [CabinClass::Economy, CabinClass::Business] {
            let expected = offers.iter()
                .filter(|(c, _)| *c == cabin.discriminator())
                .map(|(_, units)| *units as i64)
                .min();
            let got = extract_price(&root, cabin).unwrap().map(|m| m.minor_units);
            prop_assert_eq!(got, expected);
        }
    }

    #[test]
    fn prop_decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode(&bytes);
    }
}

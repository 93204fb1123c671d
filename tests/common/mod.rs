//! Shared test utilities: payload builders, scripted collaborators and fixtures.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use farewatch::config::route::Route;
use farewatch::config::SchedulerConfig;
use farewatch::error::{Error, Result};
use farewatch::events::alert::AlertEvent;
use farewatch::events::sample::PriceSample;
use farewatch::interfaces::fetcher::{Fetcher, RawResponse};
use farewatch::interfaces::notifier::Notifier;
use farewatch::types::currency::Currency;
use farewatch::types::ids::RouteId;
use farewatch::types::price::Price;
use farewatch::types::timestamp::Timestamp;
use prost::encoding::{encode_key, encode_varint, WireType};

pub fn sample(route: &str, millis: u64, price: i64) -> PriceSample {
    PriceSample {
        route_id: RouteId::from(route),
        observed_at: Timestamp::from_millis(millis),
        price: Price::from_minor(price),
        currency: Currency::Eur,
        raw_source_tag: "test/flight/ECONOMY".to_string(),
    }
}

fn put_varint(tag: u32, value: u64, buf: &mut Vec<u8>) {
    encode_key(tag, WireType::Varint, buf);
    encode_varint(value, buf);
}

fn put_bytes(tag: u32, value: &[u8], buf: &mut Vec<u8>) {
    encode_key(tag, WireType::LengthDelimited, buf);
    encode_varint(value.len() as u64, buf);
    buf.extend_from_slice(value);
}

/// One itinerary: cabin discriminator plus a price message.
pub fn itinerary(cabin: u64, minor_units: u64, currency: Option<&str>) -> Vec<u8> {
    let mut price = Vec::new();
    put_varint(1, minor_units, &mut price);
    if let Some(code) = currency {
        put_bytes(3, code.as_bytes(), &mut price);
    }

    let mut buf = Vec::new();
    put_varint(9, cabin, &mut buf);
    put_bytes(5, &price, &mut buf);
    buf
}

/// Results payload with one container holding `itineraries` and a payload currency.
pub fn flight_payload(itineraries: &[Vec<u8>], currency: &str) -> Vec<u8> {
    let mut container = Vec::new();
    for it in itineraries {
        put_bytes(1, it, &mut container);
    }

    let mut root = Vec::new();
    put_bytes(2, &container, &mut root);
    put_bytes(4, currency.as_bytes(), &mut root);
    root
}

pub fn scheduler_config(max_concurrency: usize, cycle_deadline_secs: u64) -> SchedulerConfig {
    SchedulerConfig {
        interval_secs: 3600,
        cycle_deadline_secs,
        max_concurrency,
        fetch_timeout_secs: 60,
        notify_timeout_secs: 1,
    }
}

/// What the scripted fetcher does for a route.
#[derive(Clone, Debug)]
pub enum Script {
    Respond(RawResponse),
    Fail(String),
    /// Never answers; only a deadline gets the route out.
    Hang,
    /// Answer after a delay.
    Slow(Duration, RawResponse),
}

pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<RouteId, Script>>,
    calls: Mutex<Vec<RouteId>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        ScriptedFetcher {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(self, route: &str, script: Script) -> Self {
        self.set(route, script);
        self
    }

    pub fn set(&self, route: &str, script: Script) {
        self.scripts.lock().unwrap().insert(RouteId::from(route), script);
    }

    pub fn calls(&self) -> Vec<RouteId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, route: &Route) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(route.id.clone());
        let script = self.scripts.lock().unwrap().get(&route.id).cloned();
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail(reason)) => Err(Error::Fetch(reason)),
            Some(Script::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(Script::Slow(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            None => Err(Error::Fetch(format!("no script for {}", route.id))),
        }
    }

    fn source_id(&self) -> &str {
        "test"
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<AlertEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<AlertEvent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, events: &[AlertEvent]) -> Result<()> {
        self.sent.lock().unwrap().extend_from_slice(events);
        Ok(())
    }
}

pub fn flights(ids: &[&str]) -> Vec<Route> {
    ids.iter()
        .map(|id| Route::flight(id, "VGO", "MEX", farewatch::config::route::CabinClass::Economy))
        .collect()
}

pub fn eur_flight_response(minor_units: u64) -> RawResponse {
    RawResponse::Bytes(flight_payload(&[itinerary(1, minor_units, None)], "EUR"))
}

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Datelike, Duration, NaiveDate};
use prost::encoding::{encode_key, encode_varint, WireType};
use crate::config::route::{CabinClass, Route};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Outbound explore-search query, encoded with the same field-number
/// contract the results payload uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub origin_geo: String,
    pub destination_geo: String,
    pub depart: NaiveDate,
    pub return_date: NaiveDate,
    pub cabin: CabinClass,
}

impl SearchRequest {
    pub fn for_route(route: &Route, depart: NaiveDate, return_date: NaiveDate) -> Self {
        SearchRequest {
            origin_geo: route.origin_id.clone(),
            destination_geo: route.destination_id.clone(),
            depart,
            return_date,
            cabin: route.cabin(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut origin = Vec::new();
        put_varint(1, 2, &mut origin);
        put_bytes(2, self.origin_geo.as_bytes(), &mut origin);

        let mut outbound = Vec::new();
        put_bytes(2, self.depart.format(DATE_FORMAT).to_string().as_bytes(), &mut outbound);
        put_bytes(13, &origin, &mut outbound);

        let mut inbound = Vec::new();
        put_bytes(2, self.return_date.format(DATE_FORMAT).to_string().as_bytes(), &mut inbound);
        put_bytes(14, &origin, &mut inbound);

        let mut destination = Vec::new();
        put_bytes(2, self.destination_geo.as_bytes(), &mut destination);

        // No price/stop filters: field 1 set to all ones.
        let mut filters = Vec::new();
        put_varint(1, u64::MAX, &mut filters);

        let mut buf = Vec::new();
        put_varint(1, 28, &mut buf);
        put_varint(2, 3, &mut buf);
        put_bytes(3, &outbound, &mut buf);
        put_bytes(3, &inbound, &mut buf);
        put_varint(8, 1, &mut buf);
        put_varint(9, self.cabin.discriminator(), &mut buf);
        put_varint(14, 1, &mut buf);
        put_bytes(16, &filters, &mut buf);
        put_varint(19, 1, &mut buf);
        put_bytes(22, &destination, &mut buf);
        buf
    }

    /// URL-safe base64 without padding, as the `tfs` query parameter expects.
    pub fn to_token(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.encode())
    }
}

/// Departure on the Monday after `today` (a week out if today is Monday),
/// shifted by `week_offset` weeks, returning three days later.
pub fn travel_window(today: NaiveDate, week_offset: u32) -> (NaiveDate, NaiveDate) {
    let mut days_until_monday = (7 - today.weekday().num_days_from_monday()) % 7;
    if days_until_monday == 0 {
        days_until_monday = 7;
    }
    let depart = today
        + Duration::days(i64::from(days_until_monday))
        + Duration::weeks(i64::from(week_offset));
    (depart, depart + Duration::days(3))
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

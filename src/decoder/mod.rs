pub mod layout;
pub mod request;
pub mod wire;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use crate::config::route::CabinClass;
use crate::error::{Error, Result};
use crate::interfaces::fetcher::RawResponse;
use crate::types::money::Money;

pub use layout::extract_price;
pub use wire::{decode, DecodedField, DecodedValue, WireType};

/// Raw payload bytes from a fetch. Text responses carry the blob base64-encoded,
/// as it appears when lifted out of a page.
pub fn payload_bytes(response: RawResponse) -> Result<Vec<u8>> {
    match response {
        RawResponse::Bytes(bytes) => Ok(bytes),
        RawResponse::Text(text) => {
            let trimmed = text.trim();
            [URL_SAFE_NO_PAD, URL_SAFE, STANDARD]
                .iter()
                .find_map(|engine| engine.decode(trimmed).ok())
                .ok_or_else(|| Error::malformed(0, "text payload is not base64"))
        }
    }
}

/// Decode a flight response and pull out the cheapest price for `cabin`.
pub fn extract_from_response(response: RawResponse, cabin: CabinClass) -> Result<Option<Money>> {
    let bytes = payload_bytes(response)?;
    let root = decode(&bytes)?;
    extract_price(&root, cabin)
}

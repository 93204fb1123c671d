use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::error::{Error, Result};
use crate::events::sample::PriceSample;
use crate::types::currency::Currency;
use crate::types::ids::RouteId;
use crate::types::price::Price;
use crate::types::timestamp::Timestamp;

const LEN_BYTES: usize = 4;
const CHECKSUM_BYTES: usize = 32;
pub const HEADER_BYTES: usize = LEN_BYTES + CHECKSUM_BYTES;

/// Larger frames can only come from a garbled length prefix.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Persisted form of one sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub version: u32,
    pub route_id: RouteId,
    pub observed_at: Timestamp,
    pub price_minor_units: i64,
    pub currency: Currency,
    pub raw_source_tag: String,
}

impl LogRecord {
    pub fn into_sample(self) -> PriceSample {
        PriceSample {
            route_id: self.route_id,
            observed_at: self.observed_at,
            price: Price::from_minor(self.price_minor_units),
            currency: self.currency,
            raw_source_tag: self.raw_source_tag,
        }
    }
}

impl From<&PriceSample> for LogRecord {
    fn from(sample: &PriceSample) -> Self {
        LogRecord {
            version: crate::RECORD_VERSION,
            route_id: sample.route_id.clone(),
            observed_at: sample.observed_at,
            price_minor_units: sample.price.minor_units(),
            currency: sample.currency,
            raw_source_tag: sample.raw_source_tag.clone(),
        }
    }
}

/// Frame layout: `u32 LE payload length | SHA-256(payload) | bincode payload`.
pub fn encode_frame(record: &LogRecord) -> Result<Vec<u8>> {
    let payload = bincode::serialize(record)
        .map_err(|e| Error::SerializationError(e.to_string()))?;
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(Error::SerializationError(format!("record of {} bytes exceeds frame limit", payload.len())));
    }

    let mut frame = Vec::with_capacity(HEADER_BYTES + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&Sha256::digest(&payload));
    frame.extend_from_slice(&payload);
    Ok(frame)
}

#[derive(Debug)]
pub enum FrameRead {
    Record { record: LogRecord, len: usize },
    /// Bytes end part-way through a frame.
    Incomplete,
    Corrupt(String),
}

/// Read the frame at the start of `buf`. `buf` must not be empty.
pub fn read_frame(buf: &[u8]) -> FrameRead {
    if buf.len() < HEADER_BYTES {
        return FrameRead::Incomplete;
    }

    let mut len_bytes = [0u8; LEN_BYTES];
    len_bytes.copy_from_slice(&buf[..LEN_BYTES]);
    let payload_len = u32::from_le_bytes(len_bytes) as usize;
    if payload_len == 0 || payload_len > MAX_PAYLOAD_BYTES {
        return FrameRead::Corrupt(format!("implausible payload length {}", payload_len));
    }
    if buf.len() < HEADER_BYTES + payload_len {
        return FrameRead::Incomplete;
    }

    let stored = &buf[LEN_BYTES..HEADER_BYTES];
    let payload = &buf[HEADER_BYTES..HEADER_BYTES + payload_len];
    let computed = Sha256::digest(payload);
    if computed.as_slice() != stored {
        return FrameRead::Corrupt(format!(
            "checksum mismatch (stored {}, computed {})",
            hex::encode(&stored[..4]),
            hex::encode(&computed[..4])
        ));
    }

    match bincode::deserialize::<LogRecord>(payload) {
        Ok(record) if record.version <= crate::RECORD_VERSION => FrameRead::Record {
            record,
            len: HEADER_BYTES + payload_len,
        },
        Ok(record) => FrameRead::Corrupt(format!("unsupported record version {}", record.version)),
        Err(e) => FrameRead::Corrupt(e.to_string()),
    }
}

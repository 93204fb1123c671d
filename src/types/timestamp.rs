use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observation time. Ordered by wall clock first, then by the logical counter
/// that disambiguates stamps issued within the same millisecond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub physical: u64,  // Milliseconds since epoch
    pub logical: u64,   // Monotonic counter
}

impl Timestamp {
    pub fn now() -> Self {
        HLC.now()
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp {
            physical: millis,
            logical: 0,
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(i64::try_from(self.physical).ok()?)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}#{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ"), self.logical),
            None => write!(f, "{}#{}", self.physical, self.logical),
        }
    }
}

pub struct HybridLogicalClock {
    last: Mutex<(u64, u64)>,
}

impl HybridLogicalClock {
    pub fn new() -> Self {
        HybridLogicalClock {
            last: Mutex::new((0, 0)),
        }
    }

    pub fn now(&self) -> Timestamp {
        let wall_clock = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (last_physical, last_logical) = *last;

        *last = if wall_clock > last_physical {
            // Wall clock advanced
            (wall_clock, 0)
        } else {
            // Wall clock same or went backward, increment logical
            (last_physical, last_logical + 1)
        };

        Timestamp {
            physical: last.0,
            logical: last.1,
        }
    }
}

impl Default for HybridLogicalClock {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    static ref HLC: HybridLogicalClock = HybridLogicalClock::new();
}

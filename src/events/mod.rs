pub mod alert;
pub mod sample;

pub use alert::{AlertEvent, AlertRule};
pub use sample::PriceSample;

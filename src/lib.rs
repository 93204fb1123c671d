pub mod alert;
pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod fetch;
pub mod interfaces;
pub mod normalize;
pub mod notify;
pub mod observability;
pub mod orchestrator;
pub mod store;
pub mod types;

// Price log record version
pub const RECORD_VERSION: u32 = 1;

pub mod fetcher;
pub mod notifier;

pub use fetcher::{Fetcher, RawResponse};
pub use notifier::Notifier;

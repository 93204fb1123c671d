pub mod jsonl;
pub mod log;

use std::sync::Arc;
use crate::config::NotifierConfig;
use crate::interfaces::notifier::Notifier;

pub use self::jsonl::JsonLinesNotifier;
pub use self::log::LogNotifier;

pub fn from_config(config: &NotifierConfig) -> Arc<dyn Notifier> {
    match config {
        NotifierConfig::Log => Arc::new(LogNotifier),
        NotifierConfig::JsonLines { path } => Arc::new(JsonLinesNotifier::new(path.clone())),
    }
}

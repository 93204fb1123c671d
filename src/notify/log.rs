use async_trait::async_trait;
use crate::error::Result;
use crate::events::alert::{AlertEvent, AlertRule};
use crate::interfaces::notifier::Notifier;

/// Reports alerts through the process log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, events: &[AlertEvent]) -> Result<()> {
        for event in events {
            match event.rule {
                AlertRule::FirstSeen => tracing::info!(alert_id = %event.alert_id, "{}", event),
                _ => tracing::warn!(alert_id = %event.alert_id, "{}", event),
            }
        }
        Ok(())
    }
}

use async_trait::async_trait;
use crate::events::alert::AlertEvent;
use crate::error::Result;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, events: &[AlertEvent]) -> Result<()>;
}

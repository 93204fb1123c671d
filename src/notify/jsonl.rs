use std::path::PathBuf;
use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use crate::error::{Error, Result};
use crate::events::alert::AlertEvent;
use crate::interfaces::notifier::Notifier;

/// Appends one JSON object per alert to a file that other tools can tail.
pub struct JsonLinesNotifier {
    path: PathBuf,
    // Keeps lines from concurrent routes from interleaving.
    write_lock: Mutex<()>,
}

impl JsonLinesNotifier {
    pub fn new(path: PathBuf) -> Self {
        JsonLinesNotifier {
            path,
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Notifier for JsonLinesNotifier {
    async fn send(&self, events: &[AlertEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, event)
                .map_err(|e| Error::SerializationError(e.to_string()))?;
            buf.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::Notifier(format!("open {:?}: {}", self.path, e)))?;
        file.write_all(&buf)
            .await
            .map_err(|e| Error::Notifier(format!("write {:?}: {}", self.path, e)))?;
        file.sync_data()
            .await
            .map_err(|e| Error::Notifier(format!("sync {:?}: {}", self.path, e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use crate::events::alert::AlertRule;
    use crate::types::currency::Currency;
    use crate::types::ids::{AlertId, RouteId};
    use crate::types::price::Price;
    use crate::types::timestamp::Timestamp;

    #[tokio::test]
    async fn writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        let notifier = JsonLinesNotifier::new(path.clone());

        let event = AlertEvent {
            alert_id: AlertId::new(),
            route_id: RouteId::from("VGO-MEX"),
            rule: AlertRule::AllTimeLow,
            previous_price: Price::from_minor(90_000),
            new_price: Price::from_minor(80_000),
            currency: Currency::Eur,
            delta_pct: Decimal::new(1111, 2),
            triggered_at: Timestamp::from_millis(1),
        };
        notifier.send(&[event.clone(), event]).await.unwrap();
        notifier.send(&[]).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["rule"], "ALL_TIME_LOW");
        assert_eq!(value["currency"], "EUR");
        assert_eq!(value["delta_pct"], "11.11");
    }
}

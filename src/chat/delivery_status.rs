// Simulated delivery acknowledgements.
// There is no transport behind a sent message, so each one is walked through
// sent -> delivered -> read on a fixed schedule measured from the send.

use anyhow::{anyhow, Result};
use log::debug;
use tokio::time::{sleep_until, Duration, Instant};

use crate::models::DeliveryStatus;
use super::StoreEvent;

pub const DEFAULT_DELIVERED_AFTER_MS: u64 = 1000;
pub const DEFAULT_READ_AFTER_MS: u64 = 2000;

/// Both delays are measured from the moment the message was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTimings {
    pub delivered_after: Duration,
    pub read_after: Duration,
}

impl Default for DeliveryTimings {
    fn default() -> Self {
        DeliveryTimings {
            delivered_after: Duration::from_millis(DEFAULT_DELIVERED_AFTER_MS),
            read_after: Duration::from_millis(DEFAULT_READ_AFTER_MS),
        }
    }
}

impl DeliveryTimings {
    pub fn from_millis(delivered_after_ms: u64, read_after_ms: u64) -> Result<Self> {
        if delivered_after_ms == 0 {
            return Err(anyhow!("delivered delay must be greater than zero"));
        }
        if read_after_ms <= delivered_after_ms {
            return Err(anyhow!(
                "read delay ({} ms) must be longer than delivered delay ({} ms)",
                read_after_ms,
                delivered_after_ms
            ));
        }
        Ok(DeliveryTimings {
            delivered_after: Duration::from_millis(delivered_after_ms),
            read_after: Duration::from_millis(read_after_ms),
        })
    }
}

impl super::ChatStore {
    /// Schedule both status transitions for one message.
    /// Each step targets this message id only.
    pub(crate) fn schedule_delivery(&self, conversation_id: String, message_id: String) {
        let store = self.clone();
        let timings = self.timings;
        let sent_at = Instant::now();

        tokio::spawn(async move {
            sleep_until(sent_at + timings.delivered_after).await;
            store.apply_status(&conversation_id, &message_id, DeliveryStatus::Delivered).await;

            sleep_until(sent_at + timings.read_after).await;
            store.apply_status(&conversation_id, &message_id, DeliveryStatus::Read).await;
        });
    }

    async fn apply_status(&self, conversation_id: &str, message_id: &str, status: DeliveryStatus) {
        // Held until the event is queued so events keep mutation order.
        let mut inner = self.inner.lock().await;

        if inner.advance_status(conversation_id, message_id, status) {
            self.emit(StoreEvent::StatusChanged {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
                status,
            });
        } else {
            debug!("No {:?} transition applied to {} in {}", status, message_id, conversation_id);
        }
    }
}

//! Outbox relay
//!
//! Drains undelivered outbox rows onto the channel in id order. Delivery is
//! at-least-once: a row published right before a failed `mark_delivered` is
//! published again on the next pass.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::db::OutboxStore;
use crate::notifier::Publisher;

/// Result of one relay pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayPass {
    pub delivered: usize,
    /// The pass stopped early on a publish or store failure
    pub interrupted: bool,
}

pub struct OutboxRelay {
    outbox: Arc<dyn OutboxStore>,
    publisher: Arc<dyn Publisher>,
    batch_size: i64,
    poll_interval: Duration,
}

impl OutboxRelay {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        publisher: Arc<dyn Publisher>,
        batch_size: i64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            outbox,
            publisher,
            batch_size,
            poll_interval,
        }
    }

    /// Publish one batch of pending rows.
    ///
    /// Stops at the first failure so later rows never overtake an earlier one.
    pub async fn run_once(&self) -> RelayPass {
        let mut pass = RelayPass::default();

        let entries = match self.outbox.pending(self.batch_size).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read outbox");
                pass.interrupted = true;
                return pass;
            }
        };

        for entry in entries {
            if let Err(e) = self.publisher.publish(&entry.channel, &entry.payload).await {
                tracing::warn!(
                    outbox_id = entry.id,
                    order_id = entry.order_id,
                    error = %e,
                    "Failed to publish outbox entry, will retry"
                );
                pass.interrupted = true;
                break;
            }
            if let Err(e) = self.outbox.mark_delivered(entry.id).await {
                tracing::warn!(
                    outbox_id = entry.id,
                    order_id = entry.order_id,
                    error = %e,
                    "Published but failed to mark outbox entry delivered"
                );
                pass.interrupted = true;
                break;
            }
            tracing::debug!(order_id = entry.order_id, "Relayed order notification");
            pass.delivered += 1;
        }

        pass
    }

    /// Poll until `shutdown` fires. A full batch is followed immediately by
    /// another pass instead of waiting for the next tick.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            batch_size = self.batch_size,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Outbox relay started"
        );

        loop {
            let pass = self.run_once().await;
            let backlog = !pass.interrupted && pass.delivered as i64 >= self.batch_size;
            if backlog {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Outbox relay received shutdown signal");
                    return;
                }
            }
        }
    }
}

//! Order-created announcements on the publish/subscribe channel
//!
//! Delivery is fire-and-forget: a publish with no subscribers still counts as
//! success, and the channel never retains messages.

mod redis_publisher;

use std::sync::Arc;

use async_trait::async_trait;
use shared::order::OrderNotification;

use crate::error::NotifyError;

pub use redis_publisher::RedisPublisher;

/// Raw channel transport
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NotifyError>;
}

/// Stand-in when the channel could not be reached at startup.
/// Every publish fails with [`NotifyError::Unavailable`].
#[derive(Debug, Clone)]
pub struct DisabledPublisher {
    reason: String,
}

impl DisabledPublisher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Publisher for DisabledPublisher {
    async fn publish(&self, _channel: &str, _payload: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable(self.reason.clone()))
    }
}

/// Publishes [`OrderNotification`]s as JSON on one channel
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn Publisher>,
    channel: String,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn Publisher>, channel: impl Into<String>) -> Self {
        Self {
            publisher,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Serialize and publish once. No retry.
    pub async fn announce(&self, notification: &OrderNotification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification)?;
        self.publisher.publish(&self.channel, &payload).await
    }
}

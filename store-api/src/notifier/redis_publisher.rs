//! Redis PUBLISH over a self-healing connection

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::debug;

use super::Publisher;
use crate::config::RedisConfig;
use crate::error::NotifyError;

/// [`Publisher`] backed by a Redis [`ConnectionManager`]
///
/// When the server drops the connection, the publish that notices it fails
/// and the manager dials again in the background. Later publishes use the
/// new connection once it is up.
#[derive(Clone)]
pub struct RedisPublisher {
    conn: ConnectionManager,
}

impl RedisPublisher {
    /// Dial once and PING.
    ///
    /// The bootstrap policy owns startup retries; the manager's own retries
    /// are off.
    pub async fn connect(config: &RedisConfig) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(config.url())?;
        let manager_config = ConnectionManagerConfig::new().set_number_of_retries(0);
        let mut conn = ConnectionManager::new_with_config(client, manager_config).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NotifyError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(channel, payload).await?;
        debug!(channel, receivers, "Published notification");
        Ok(())
    }
}

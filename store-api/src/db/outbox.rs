//! Transactional outbox of order-created notifications
//!
//! Rows are written by [`super::PgOrderStore`] in the order's own transaction
//! and drained by [`crate::relay::OutboxRelay`].

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::PersistenceError;

/// One undelivered notification
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub order_id: i64,
    pub channel: String,
    /// Serialized `OrderNotification`
    pub payload: String,
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Oldest undelivered entries first, at most `limit`
    async fn pending(&self, limit: i64) -> Result<Vec<OutboxEntry>, PersistenceError>;

    async fn mark_delivered(&self, id: i64) -> Result<(), PersistenceError>;
}

#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn pending(&self, limit: i64) -> Result<Vec<OutboxEntry>, PersistenceError> {
        let rows: Vec<OutboxEntry> = sqlx::query_as(
            r#"
            SELECT id, order_id, channel, payload
            FROM order_outbox
            WHERE delivered_at IS NULL
            ORDER BY id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_delivered(&self, id: i64) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            UPDATE order_outbox
            SET delivered_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND delivered_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

//! Order persistence

use async_trait::async_trait;
use shared::order::{NewOrder, Order, OrderNotification, STATUS_PENDING};
use sqlx::PgPool;

use crate::error::PersistenceError;

/// Outcome of a successful persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedOrder {
    pub id: i64,
    pub product_id: String,
    pub quantity: i32,
    /// The idempotency key matched an existing order; nothing was written
    pub replayed: bool,
}

impl PersistedOrder {
    pub fn notification(&self) -> OrderNotification {
        OrderNotification {
            order_id: self.id,
            product_id: self.product_id.clone(),
            quantity: self.quantity,
        }
    }
}

/// Durable order storage
///
/// `persist` either stores exactly one `pending` row and returns its fresh id,
/// or fails with no row stored. With an idempotency key that was already
/// used, it returns the earlier order with `replayed = true`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn persist(&self, order: &NewOrder) -> Result<PersistedOrder, PersistenceError>;
}

/// PostgreSQL-backed [`OrderStore`]
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
    /// When set, every new order also gets an outbox row for this channel
    outbox_channel: Option<String>,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            outbox_channel: None,
        }
    }

    /// Write an outbox row in the same transaction as each new order
    pub fn with_outbox(mut self, channel: impl Into<String>) -> Self {
        self.outbox_channel = Some(channel.into());
        self
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn persist(&self, order: &NewOrder) -> Result<PersistedOrder, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO orders (product_id, quantity, status, idempotency_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&order.product_id)
        .bind(order.quantity)
        .bind(STATUS_PENDING)
        .bind(&order.idempotency_key)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id,)) = inserted else {
            // Only a non-NULL key can conflict
            let existing: Order = sqlx::query_as(
                r#"
                SELECT id, product_id, quantity, status, idempotency_key, created_at
                FROM orders
                WHERE idempotency_key = $1
                "#,
            )
            .bind(&order.idempotency_key)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;

            return Ok(PersistedOrder {
                id: existing.id,
                product_id: existing.product_id,
                quantity: existing.quantity,
                replayed: true,
            });
        };

        let persisted = PersistedOrder {
            id,
            product_id: order.product_id.clone(),
            quantity: order.quantity,
            replayed: false,
        };

        if let Some(channel) = &self.outbox_channel {
            let payload = serde_json::to_string(&persisted.notification())?;
            sqlx::query(
                r#"
                INSERT INTO order_outbox (order_id, channel, payload)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(id)
            .bind(channel)
            .bind(&payload)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(persisted)
    }
}

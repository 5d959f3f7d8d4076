//! In-memory doubles for the store, outbox and channel
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use shared::order::{NewOrder, Order, OrderNotification, STATUS_PENDING};

use crate::db::{OrderStore, OutboxEntry, OutboxStore, PersistedOrder};
use crate::error::{NotifyError, PersistenceError};
use crate::notifier::Publisher;

#[derive(Default)]
struct OrderTable {
    rows: Vec<Order>,
    unavailable: bool,
}

/// [`OrderStore`] backed by a vector. Ids start at 1 and never skip.
#[derive(Default)]
pub struct MemoryOrderStore {
    table: Mutex<OrderTable>,
    outbox: Option<(Arc<MemoryOutbox>, String)>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an outbox entry for every new order, like `PgOrderStore::with_outbox`
    pub fn with_outbox(mut self, channel: impl Into<String>) -> Self {
        self.outbox = Some((Arc::new(MemoryOutbox::new()), channel.into()));
        self
    }

    pub fn outbox(&self) -> Option<Arc<MemoryOutbox>> {
        self.outbox.as_ref().map(|(outbox, _)| outbox.clone())
    }

    /// While set, every persist fails and nothing is stored
    pub fn set_unavailable(&self, unavailable: bool) {
        self.table.lock().unavailable = unavailable;
    }

    pub fn orders(&self) -> Vec<Order> {
        self.table.lock().rows.clone()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn persist(&self, order: &NewOrder) -> Result<PersistedOrder, PersistenceError> {
        let mut table = self.table.lock();
        if table.unavailable {
            return Err(PersistenceError::Unavailable("connection refused".into()));
        }

        if let Some(key) = &order.idempotency_key {
            if let Some(existing) = table
                .rows
                .iter()
                .find(|row| row.idempotency_key.as_deref() == Some(key.as_str()))
            {
                return Ok(PersistedOrder {
                    id: existing.id,
                    product_id: existing.product_id.clone(),
                    quantity: existing.quantity,
                    replayed: true,
                });
            }
        }

        let row = Order {
            id: table.rows.len() as i64 + 1,
            product_id: order.product_id.clone(),
            quantity: order.quantity,
            status: STATUS_PENDING.to_string(),
            idempotency_key: order.idempotency_key.clone(),
            created_at: Utc::now(),
        };

        if let Some((outbox, channel)) = &self.outbox {
            let payload = serde_json::to_string(&row.notification())?;
            outbox.push(row.id, channel, &payload);
        }

        let persisted = PersistedOrder {
            id: row.id,
            product_id: row.product_id.clone(),
            quantity: row.quantity,
            replayed: false,
        };
        table.rows.push(row);
        Ok(persisted)
    }
}

#[derive(Default)]
struct OutboxTable {
    entries: Vec<(OutboxEntry, bool)>,
    unavailable: bool,
}

/// [`OutboxStore`] backed by a vector
#[derive(Default)]
pub struct MemoryOutbox {
    table: Mutex<OutboxTable>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, order_id: i64, channel: &str, payload: &str) {
        let mut table = self.table.lock();
        let id = table.entries.len() as i64 + 1;
        table.entries.push((
            OutboxEntry {
                id,
                order_id,
                channel: channel.to_string(),
                payload: payload.to_string(),
            },
            false,
        ));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.table.lock().unavailable = unavailable;
    }

    pub fn pending_count(&self) -> usize {
        self.table.lock().entries.iter().filter(|(_, done)| !done).count()
    }
}

#[async_trait]
impl OutboxStore for MemoryOutbox {
    async fn pending(&self, limit: i64) -> Result<Vec<OutboxEntry>, PersistenceError> {
        let table = self.table.lock();
        if table.unavailable {
            return Err(PersistenceError::Unavailable("connection refused".into()));
        }
        Ok(table
            .entries
            .iter()
            .filter(|(_, done)| !done)
            .take(limit.max(0) as usize)
            .map(|(entry, _)| entry.clone())
            .collect())
    }

    async fn mark_delivered(&self, id: i64) -> Result<(), PersistenceError> {
        let mut table = self.table.lock();
        if table.unavailable {
            return Err(PersistenceError::Unavailable("connection refused".into()));
        }
        if let Some((_, done)) = table.entries.iter_mut().find(|(entry, _)| entry.id == id) {
            *done = true;
        }
        Ok(())
    }
}

/// [`Publisher`] that records every successful publish
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String)>>,
    unavailable: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every publish fails and nothing is recorded
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }

    /// `(channel, payload)` pairs in publish order
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    /// Published payloads decoded as notifications
    pub fn notifications(&self) -> Vec<OrderNotification> {
        self.published
            .lock()
            .iter()
            .filter_map(|(_, payload)| serde_json::from_str(payload).ok())
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NotifyError> {
        if *self.unavailable.lock() {
            return Err(NotifyError::Unavailable("connection reset".into()));
        }
        self.published
            .lock()
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }
}

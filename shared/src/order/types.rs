//! Order domain types shared by the ingestion service and its consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known channel on which order-created notifications are published
pub const ORDERS_CHANNEL: &str = "orders";

/// Maximum stored length of a product identifier (matches the column width)
pub const PRODUCT_ID_MAX_LEN: usize = 50;

/// Status of every order the ingestion path creates
///
/// Later states are owned by the downstream worker.
pub const STATUS_PENDING: &str = "pending";

/// Durable order record (one row of the `orders` table)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    /// Store-assigned identifier, never reused
    pub id: i64,
    pub product_id: String,
    pub quantity: i32,
    /// [`STATUS_PENDING`] until a downstream worker moves it on
    pub status: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Projection announced on the orders channel
    pub fn notification(&self) -> OrderNotification {
        OrderNotification {
            order_id: self.id,
            product_id: self.product_id.clone(),
            quantity: self.quantity,
        }
    }
}

/// Input to the persist operation (product id already sanitized)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub product_id: String,
    pub quantity: i32,
    pub idempotency_key: Option<String>,
}

/// Ephemeral order-created announcement
///
/// Only ever built for an order that is already durably stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderNotification {
    pub order_id: i64,
    pub product_id: String,
    pub quantity: i32,
}

/// `POST /buy` request body
///
/// Missing and `null` fields both decode to `None`; the accessors turn them
/// into zero values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuyRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i32>,
}

impl BuyRequest {
    /// Decode the first JSON value of `body`
    ///
    /// Whatever follows that value is ignored, so `{"quantity":1} trailing`
    /// decodes. An empty body is an error.
    pub fn from_first_value(body: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::Deserializer::from_slice(body)
            .into_iter::<Self>()
            .next()
        {
            Some(result) => result,
            None => serde_json::from_slice(body),
        }
    }

    pub fn product_id(&self) -> &str {
        self.product_id.as_deref().unwrap_or_default()
    }

    pub fn quantity(&self) -> i32 {
        self.quantity.unwrap_or_default()
    }
}

/// `POST /buy` success body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuyResponse {
    pub status: String,
    pub product_id: String,
    pub order_id: i64,
}

impl BuyResponse {
    pub const PROCESSED: &'static str = "Order processed";

    pub fn processed(product_id: impl Into<String>, order_id: i64) -> Self {
        Self {
            status: Self::PROCESSED.to_string(),
            product_id: product_id.into(),
            order_id,
        }
    }
}

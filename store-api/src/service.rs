//! Order ingestion
//!
//! sanitize → validate → persist → announce. The order is durable before
//! anything is announced; a failed announcement never fails the request.

use std::sync::Arc;

use shared::order::{BuyResponse, NewOrder};
use tracing::{info, warn};

use crate::config::NotifyMode;
use crate::db::OrderStore;
use crate::error::ServiceResult;
use crate::notifier::Notifier;
use crate::sanitize::{self, ProductIdPolicy};

/// A decoded purchase request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Purchase {
    pub product_id: String,
    pub quantity: i32,
    pub idempotency_key: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    notifier: Notifier,
    notify_mode: NotifyMode,
    product_id_policy: ProductIdPolicy,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            notify_mode: NotifyMode::Direct,
            product_id_policy: ProductIdPolicy::Denylist,
        }
    }

    /// In outbox mode the store writes the notification; this service never publishes.
    pub fn with_notify_mode(mut self, mode: NotifyMode) -> Self {
        self.notify_mode = mode;
        self
    }

    pub fn with_product_id_policy(mut self, policy: ProductIdPolicy) -> Self {
        self.product_id_policy = policy;
        self
    }

    pub async fn handle_purchase(&self, purchase: Purchase) -> ServiceResult<BuyResponse> {
        let product_id = sanitize::sanitize(&purchase.product_id);
        sanitize::validate_product_id(&product_id, self.product_id_policy)?;
        sanitize::validate_quantity(purchase.quantity)?;
        if let Some(key) = &purchase.idempotency_key {
            sanitize::validate_idempotency_key(key)?;
        }

        let new_order = NewOrder {
            product_id,
            quantity: purchase.quantity,
            idempotency_key: purchase.idempotency_key,
        };
        let order = self.store.persist(&new_order).await?;

        if order.replayed {
            info!(order_id = order.id, "Idempotent replay, returning existing order");
            return Ok(BuyResponse::processed(order.product_id, order.id));
        }

        if self.notify_mode == NotifyMode::Direct {
            if let Err(e) = self.notifier.announce(&order.notification()).await {
                warn!(
                    order_id = order.id,
                    channel = self.notifier.channel(),
                    error = %e,
                    "Redis publish error"
                );
            }
        }

        info!(
            order_id = order.id,
            product_id = %order.product_id,
            quantity = order.quantity,
            "Order processed"
        );

        Ok(BuyResponse::processed(order.product_id, order.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::testkit::{MemoryOrderStore, RecordingPublisher};
    use shared::error::ErrorCode;

    fn service() -> (OrderService, Arc<MemoryOrderStore>, Arc<RecordingPublisher>) {
        let store = Arc::new(MemoryOrderStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let service = OrderService::new(store.clone(), Notifier::new(publisher.clone(), "orders"));
        (service, store, publisher)
    }

    fn purchase(product_id: &str, quantity: i32) -> Purchase {
        Purchase {
            product_id: product_id.into(),
            quantity,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_persists_then_announces() {
        let (service, store, publisher) = service();

        let response = service.handle_purchase(purchase("<script>", 2)).await.unwrap();

        assert_eq!(response, BuyResponse::processed("script", 1));
        let orders = store.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].product_id, "script");
        assert_eq!(orders[0].status, "pending");
        let notifications = publisher.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].order_id, 1);
        assert_eq!(notifications[0].product_id, "script");
    }

    #[tokio::test]
    async fn test_store_failure_never_announces() {
        let (service, store, publisher) = service();
        store.set_unavailable(true);

        let err = service.handle_purchase(purchase("sku", 1)).await.unwrap_err();

        assert!(matches!(err, ServiceError::Persistence(_)));
        assert!(store.orders().is_empty());
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_channel_failure_still_succeeds() {
        let (service, store, publisher) = service();
        publisher.set_unavailable(true);

        let response = service.handle_purchase(purchase("sku", 1)).await.unwrap();

        assert_eq!(response.order_id, 1);
        assert_eq!(store.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_persist() {
        let (service, store, _) = service();

        let err = service.handle_purchase(purchase("sku", -1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::App(ref e) if e.code == ErrorCode::InvalidQuantity));

        let long = "x".repeat(51);
        assert!(service.handle_purchase(purchase(&long, 1)).await.is_err());
        assert!(store.orders().is_empty());
    }

    #[tokio::test]
    async fn test_sanitize_runs_before_length_check() {
        let (service, _, _) = service();
        // 55 characters, 50 after the deny-listed ones are stripped
        let id = format!("{}<<>>;", "a".repeat(50));
        let response = service.handle_purchase(purchase(&id, 1)).await.unwrap();
        assert_eq!(response.product_id.len(), 50);
    }

    #[tokio::test]
    async fn test_idempotent_replay_announces_once() {
        let (service, store, publisher) = service();
        let keyed = Purchase {
            idempotency_key: Some("req-1".into()),
            ..purchase("sku", 3)
        };

        let first = service.handle_purchase(keyed.clone()).await.unwrap();
        let second = service.handle_purchase(keyed).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.orders().len(), 1);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn test_outbox_mode_skips_direct_publish() {
        let store = Arc::new(MemoryOrderStore::new().with_outbox("orders"));
        let publisher = Arc::new(RecordingPublisher::new());
        let service = OrderService::new(store.clone(), Notifier::new(publisher.clone(), "orders"))
            .with_notify_mode(NotifyMode::Outbox);

        service.handle_purchase(purchase("sku", 1)).await.unwrap();

        assert!(publisher.published().is_empty());
        let outbox = store.outbox().unwrap();
        assert_eq!(outbox.pending_count(), 1);
    }
}

//! PostgreSQL store, outbox and migrations against a real server
//!
//! Each test gets a fresh database from `#[sqlx::test]`. They are ignored by
//! default; run them with `DATABASE_URL` set and `cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use shared::order::{NewOrder, Order, OrderNotification};
use sqlx::PgPool;
use store_api::db::{self, OrderStore, OutboxStore, PgOrderStore, PgOutboxStore};
use store_api::relay::OutboxRelay;
use store_api::testkit::RecordingPublisher;

fn new_order(product_id: &str, quantity: i32, key: Option<&str>) -> NewOrder {
    NewOrder {
        product_id: product_id.into(),
        quantity,
        idempotency_key: key.map(Into::into),
    }
}

async fn orders(pool: &PgPool) -> Vec<Order> {
    sqlx::query_as(
        r#"
        SELECT id, product_id, quantity, status, idempotency_key, created_at
        FROM orders
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

async fn outbox_rows(pool: &PgPool) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_outbox")
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn test_persist_stores_one_pending_row(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());

    let first = store.persist(&new_order("script", 2, None)).await.unwrap();
    let second = store.persist(&new_order("other", 1, None)).await.unwrap();

    assert!(!first.replayed);
    assert!(second.id > first.id);

    let rows = orders(&pool).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, first.id);
    assert_eq!(rows[0].product_id, "script");
    assert_eq!(rows[0].quantity, 2);
    assert_eq!(rows[0].status, "pending");
    assert_eq!(rows[0].idempotency_key, None);
    assert_eq!(outbox_rows(&pool).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn test_keyed_replay_returns_original_order(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone());

    let first = store
        .persist(&new_order("a", 1, Some("checkout-42")))
        .await
        .unwrap();
    let replay = store
        .persist(&new_order("b", 9, Some("checkout-42")))
        .await
        .unwrap();

    assert!(!first.replayed);
    assert!(replay.replayed);
    assert_eq!(replay.id, first.id);
    assert_eq!(replay.product_id, "a");
    assert_eq!(replay.quantity, 1);
    assert_eq!(orders(&pool).await.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn test_concurrent_same_key_writes_one_row(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone()).with_outbox("orders");
    let order = new_order("a", 1, Some("retry-storm"));

    let results = join_all((0..10).map(|_| store.persist(&order))).await;

    let persisted: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    let id = persisted[0].id;
    assert!(persisted.iter().all(|p| p.id == id));
    assert_eq!(persisted.iter().filter(|p| !p.replayed).count(), 1);
    assert_eq!(orders(&pool).await.len(), 1);
    assert_eq!(outbox_rows(&pool).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn test_outbox_row_written_with_order(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone()).with_outbox("orders");
    let outbox = PgOutboxStore::new(pool.clone());

    let persisted = store.persist(&new_order("a", 3, None)).await.unwrap();

    let pending = outbox.pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].order_id, persisted.id);
    assert_eq!(pending[0].channel, "orders");
    let notification: OrderNotification = serde_json::from_str(&pending[0].payload).unwrap();
    assert_eq!(notification, persisted.notification());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn test_pending_respects_order_and_mark_delivered(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone()).with_outbox("orders");
    let outbox = PgOutboxStore::new(pool.clone());
    for product_id in ["a", "b", "c"] {
        store.persist(&new_order(product_id, 1, None)).await.unwrap();
    }

    let pending = outbox.pending(2).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending[0].id < pending[1].id);

    outbox.mark_delivered(pending[0].id).await.unwrap();
    // a second mark is a no-op
    outbox.mark_delivered(pending[0].id).await.unwrap();

    let remaining = outbox.pending(10).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].id, pending[1].id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn test_relay_drains_postgres_outbox(pool: PgPool) {
    let store = PgOrderStore::new(pool.clone()).with_outbox("orders");
    let outbox = Arc::new(PgOutboxStore::new(pool.clone()));
    let publisher = Arc::new(RecordingPublisher::new());
    let mut ids = Vec::new();
    for product_id in ["a", "b", "c"] {
        ids.push(store.persist(&new_order(product_id, 1, None)).await.unwrap().id);
    }

    let relay = OutboxRelay::new(outbox.clone(), publisher.clone(), 2, Duration::from_millis(10));
    assert_eq!(relay.run_once().await.delivered, 2);
    assert_eq!(relay.run_once().await.delivered, 1);
    assert_eq!(relay.run_once().await.delivered, 0);

    let announced: Vec<i64> = publisher.notifications().iter().map(|n| n.order_id).collect();
    assert_eq!(announced, ids);
    assert!(outbox.pending(10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = false)]
#[ignore = "needs a PostgreSQL DATABASE_URL"]
async fn test_migrations_upgrade_legacy_table(pool: PgPool) {
    sqlx::query(
        r#"
        CREATE TABLE orders (
            id SERIAL PRIMARY KEY,
            product_id VARCHAR(50),
            quantity INT,
            status VARCHAR(20),
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        r#"
        INSERT INTO orders (product_id, quantity, status, created_at)
        VALUES ('legacy', 4, 'pending', '2024-01-02 03:04:05')
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    db::migrate(&pool).await.unwrap();
    // a second run applies nothing
    db::migrate(&pool).await.unwrap();

    let store = PgOrderStore::new(pool.clone()).with_outbox("orders");
    let persisted = store.persist(&new_order("new", 1, Some("k1"))).await.unwrap();
    assert_eq!(persisted.id, 2);

    let rows = orders(&pool).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].product_id, "legacy");
    assert_eq!(rows[0].created_at.to_rfc3339(), "2024-01-02T03:04:05+00:00");
    assert_eq!(rows[1].idempotency_key.as_deref(), Some("k1"));
    assert_eq!(outbox_rows(&pool).await, 1);
}

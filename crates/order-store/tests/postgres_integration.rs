//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use order_store::{
    AccountId, ErrorKind, InMemoryOrderRepository, Money, Order, OrderId, OrderRepository,
    OrderStoreError, OrderedProduct, PostgresOrderRepository,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_orders_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            // Rejects one specific product so tests can fail a write halfway
            // through the line item batch.
            sqlx::raw_sql(
                r#"
                CREATE OR REPLACE FUNCTION reject_poison_product() RETURNS trigger AS $$
                BEGIN
                    IF NEW.product_id = 'poison' THEN
                        RAISE EXCEPTION 'poison product rejected';
                    END IF;
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;

                DROP TRIGGER IF EXISTS reject_poison ON order_products;
                CREATE TRIGGER reject_poison BEFORE INSERT ON order_products
                    FOR EACH ROW EXECUTE FUNCTION reject_poison_product();
                "#,
            )
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh repository with its own pool and cleared tables
async fn get_test_repository() -> PostgresOrderRepository {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_products, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderRepository::new(pool)
}

fn place(account: &str, products: &[(&str, i64, u32)]) -> Order {
    Order::place(
        AccountId::new(account),
        products
            .iter()
            .map(|(id, cents, qty)| OrderedProduct::new(*id, Money::from_cents(*cents), *qty))
            .collect(),
    )
    .unwrap()
}

#[tokio::test]
async fn put_and_read_order() {
    let repo = get_test_repository().await;
    let order = place("acc-1", &[("p1", 1000, 2), ("p2", 550, 1)]);

    repo.put_order(&order).await.unwrap();

    let orders = repo
        .get_orders_for_account(&AccountId::new("acc-1"))
        .await
        .unwrap();
    assert_eq!(orders, vec![order.clone()]);
    assert_eq!(orders[0].total_price, Money::from_cents(2550));
}

#[tokio::test]
async fn read_groups_multiple_orders() {
    let repo = get_test_repository().await;
    let a = place("acc-1", &[("a1", 100, 1), ("a2", 200, 2), ("a3", 300, 3)]);
    let b = place("acc-1", &[("b1", 400, 4), ("b2", 500, 5)]);
    let single = place("acc-1", &[("c1", 600, 6)]);

    for order in [&a, &b, &single] {
        repo.put_order(order).await.unwrap();
    }

    let orders = repo
        .get_orders_for_account(&AccountId::new("acc-1"))
        .await
        .unwrap();

    let counts: Vec<_> = orders.iter().map(|o| o.products.len()).collect();
    assert_eq!(counts, vec![3, 2, 1]);
    assert_eq!(orders[0].id, a.id);
    assert_eq!(orders[2].id, single.id);
    assert_eq!(orders[1].products[1].quantity, 5);
    assert_eq!(orders[1].products[1].price, Money::from_cents(500));
}

#[tokio::test]
async fn line_items_are_sorted_by_product_id() {
    let repo = get_test_repository().await;
    let order = place("acc-1", &[("zeta", 1, 1), ("alpha", 1, 1), ("mid", 1, 1)]);
    repo.put_order(&order).await.unwrap();

    let stored = repo.get_order(order.id).await.unwrap();
    let ids: Vec<_> = stored.products.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn line_item_order_matches_in_memory_store() {
    let repo = get_test_repository().await;
    let memory = InMemoryOrderRepository::new();
    let order = place(
        "acc-1",
        &[("p10", 1, 1), ("a", 1, 1), ("p-10", 1, 1), ("B", 1, 1)],
    );
    repo.put_order(&order).await.unwrap();
    memory.put_order(&order).await.unwrap();

    let account = AccountId::new("acc-1");
    let from_pg = repo.get_orders_for_account(&account).await.unwrap();
    let from_memory = memory.get_orders_for_account(&account).await.unwrap();
    assert_eq!(from_pg, from_memory);

    let ids: Vec<_> = from_pg[0].products.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["B", "a", "p-10", "p10"]);
    assert_eq!(repo.get_order(order.id).await.unwrap(), from_memory[0]);
}

#[tokio::test]
async fn product_id_column_compares_bytewise() {
    let repo = get_test_repository().await;

    let collation: Option<String> = sqlx::query_scalar(
        r#"
        SELECT collation_name::text FROM information_schema.columns
        WHERE table_name = 'order_products' AND column_name = 'product_id'
        "#,
    )
    .fetch_one(repo.pool())
    .await
    .unwrap();
    assert_eq!(collation.as_deref(), Some("C"));
}

#[tokio::test]
async fn empty_account_returns_empty_list() {
    let repo = get_test_repository().await;
    let orders = repo
        .get_orders_for_account(&AccountId::new("nobody"))
        .await
        .unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn failed_line_item_rolls_back_whole_order() {
    let repo = get_test_repository().await;
    let order = place("acc-1", &[("ok-1", 100, 1), ("poison", 100, 1), ("ok-2", 100, 1)]);

    let err = repo.put_order(&order).await.unwrap_err();
    assert!(matches!(err, OrderStoreError::Database { .. }));
    assert_eq!(err.kind(), ErrorKind::Internal);

    let orders = repo
        .get_orders_for_account(&AccountId::new("acc-1"))
        .await
        .unwrap();
    assert!(orders.is_empty());

    let headers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_products")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!((headers, items), (0, 0));
}

#[tokio::test]
async fn duplicate_order_id_is_rejected() {
    let repo = get_test_repository().await;
    let order = place("acc-1", &[("p1", 100, 1)]);
    repo.put_order(&order).await.unwrap();

    let err = repo.put_order(&order).await.unwrap_err();
    assert!(matches!(err, OrderStoreError::DuplicateOrder(id) if id == order.id));
}

#[tokio::test]
async fn invalid_order_is_rejected_before_storage() {
    let repo = get_test_repository().await;
    let order = place("acc-1", &[("p1", 100, 0)]);

    let err = repo.put_order(&order).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);

    let headers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(headers, 0);
}

#[tokio::test]
async fn get_missing_order_is_not_found() {
    let repo = get_test_repository().await;
    let err = repo.get_order(OrderId::generate()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn concurrent_readers_never_see_partial_orders() {
    let repo = get_test_repository().await;
    let account = AccountId::new("acc-busy");

    let writer = {
        let repo = repo.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                let products: Vec<_> = (0..20)
                    .map(|p| (format!("p{i}-{p:02}"), 100_i64, 1_u32))
                    .collect();
                let products: Vec<_> = products
                    .iter()
                    .map(|(id, cents, qty)| (id.as_str(), *cents, *qty))
                    .collect();
                repo.put_order(&place("acc-busy", &products)).await.unwrap();
            }
        })
    };

    while !writer.is_finished() {
        let orders = repo.get_orders_for_account(&account).await.unwrap();
        assert!(orders.iter().all(|o| o.products.len() == 20));
    }
    writer.await.unwrap();

    let orders = repo.get_orders_for_account(&account).await.unwrap();
    assert_eq!(orders.len(), 50);
}

#[tokio::test]
async fn dropped_write_is_rolled_back() {
    let repo = get_test_repository().await;
    let order = place("acc-cancel", &[("p1", 100, 1), ("p2", 100, 1)]);

    // Holding this lock parks the line item insert after the header row went
    // in, so the write is always abandoned mid-transaction.
    let mut blocker = repo.pool().begin().await.unwrap();
    sqlx::query("LOCK TABLE order_products IN EXCLUSIVE MODE")
        .execute(&mut *blocker)
        .await
        .unwrap();

    let result =
        tokio::time::timeout(std::time::Duration::from_millis(200), repo.put_order(&order)).await;
    assert!(result.is_err());

    blocker.rollback().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let orders = repo
        .get_orders_for_account(&AccountId::new("acc-cancel"))
        .await
        .unwrap();
    assert!(orders.is_empty());

    let headers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_products")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!((headers, items), (0, 0));
}

use std::time::Instant;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AccountId, Money, Order, OrderAssembler, OrderId, OrderRow, OrderStoreError, ProductId,
    Result,
    repository::{OrderRepository, validate_order_for_put},
};

const SELECT_ORDER_ROWS: &str = r#"
    SELECT o.id, o.created_at, o.account_id, o.total_price,
           op.product_id, op.quantity, op.price
    FROM orders o
    JOIN order_products op ON o.id = op.order_id
"#;

/// PostgreSQL-backed order repository.
///
/// Orders live in two tables: `orders` holds one header row per order and
/// `order_products` one row per line item, keyed by `(order_id,
/// product_id)`.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a repository on top of an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn insert_order(tx: &mut Transaction<'static, Postgres>, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, created_at, account_id, total_price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.created_at)
        .bind(order.account_id.as_str())
        .bind(order.total_price.cents())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return OrderStoreError::DuplicateOrder(order.id);
            }
            OrderStoreError::Database {
                operation: "insert order header",
                source: e,
            }
        })?;

        // All line items go in one statement; any failure aborts the
        // surrounding transaction.
        let mut product_ids = Vec::with_capacity(order.products.len());
        let mut quantities = Vec::with_capacity(order.products.len());
        let mut prices = Vec::with_capacity(order.products.len());
        for product in &order.products {
            let quantity =
                i32::try_from(product.quantity).map_err(|_| OrderStoreError::InvalidQuantity {
                    product_id: product.id.clone(),
                    quantity: product.quantity,
                })?;
            product_ids.push(product.id.as_str().to_string());
            quantities.push(quantity);
            prices.push(product.price.cents());
        }

        sqlx::query(
            r#"
            INSERT INTO order_products (order_id, product_id, quantity, price)
            SELECT $1, item.product_id, item.quantity, item.price
            FROM UNNEST($2::text[], $3::int4[], $4::int8[]) AS item(product_id, quantity, price)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(product_ids)
        .bind(quantities)
        .bind(prices)
        .execute(&mut **tx)
        .await
        .map_err(OrderStoreError::database("insert order products"))?;

        Ok(())
    }

    fn row_to_order_row(row: &PgRow) -> Result<OrderRow> {
        let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity).map_err(|_| OrderStoreError::CorruptRow {
            order_id,
            reason: format!("negative quantity {quantity}"),
        })?;

        Ok(OrderRow {
            order_id,
            created_at: row.try_get("created_at")?,
            account_id: AccountId::new(row.try_get::<String, _>("account_id")?),
            total_price: Money::from_cents(row.try_get("total_price")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity,
            price: Money::from_cents(row.try_get("price")?),
        })
    }

    /// Streams the rows of `query` through an [`OrderAssembler`] without
    /// buffering the flat result set.
    async fn fetch_orders(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Order>> {
        let mut rows = query.fetch(&self.pool);
        let mut assembler = OrderAssembler::new();

        while let Some(row) = rows
            .try_next()
            .await
            .map_err(OrderStoreError::database("read orders"))?
        {
            assembler.push(Self::row_to_order_row(&row)?)?;
        }

        Ok(assembler.finish())
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id, items = order.products.len()))]
    async fn put_order(&self, order: &Order) -> Result<()> {
        validate_order_for_put(order)?;
        let started = Instant::now();

        // The transaction rolls back when dropped without a commit, which
        // also covers the caller dropping this future mid-write.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(OrderStoreError::database("begin transaction"))?;

        if let Err(e) = Self::insert_order(&mut tx, order).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            tracing::debug!(error = %e, kind = %e.kind(), "order write rolled back");
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(OrderStoreError::database("commit order"))?;

        metrics::histogram!("order_write_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_orders_for_account(&self, account_id: &AccountId) -> Result<Vec<Order>> {
        let started = Instant::now();
        let sql = format!(
            "{SELECT_ORDER_ROWS} WHERE o.account_id = $1 ORDER BY o.id ASC, op.product_id COLLATE \"C\" ASC"
        );

        let orders = self
            .fetch_orders(sqlx::query(&sql).bind(account_id.as_str()))
            .await?;

        metrics::histogram!("order_read_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(orders = orders.len(), "orders loaded");
        Ok(orders)
    }

    #[tracing::instrument(skip(self))]
    async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        let sql =
            format!("{SELECT_ORDER_ROWS} WHERE o.id = $1 ORDER BY op.product_id COLLATE \"C\" ASC");

        self.fetch_orders(sqlx::query(&sql).bind(order_id.as_uuid()))
            .await?
            .pop()
            .ok_or(OrderStoreError::OrderNotFound(order_id))
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    AccountId, Money, Order, OrderId, OrderRow, OrderStoreError, ProductId, Result,
    assembler::assemble_orders,
    repository::{OrderRepository, validate_order_for_put},
};

#[derive(Debug, Clone)]
struct HeaderRow {
    created_at: DateTime<Utc>,
    account_id: AccountId,
    total_price: Money,
}

#[derive(Debug, Clone)]
struct LineRow {
    quantity: u32,
    price: Money,
}

#[derive(Debug, Default)]
struct Tables {
    orders: BTreeMap<OrderId, HeaderRow>,
    order_products: BTreeMap<OrderId, BTreeMap<ProductId, LineRow>>,
    writes_started: usize,
    fail_on_product: Option<usize>,
    unavailable: bool,
}

impl Tables {
    /// Joins headers and line items the way the SQL read does, sorted by
    /// order ID then product ID.
    fn joined_rows<'a>(
        &'a self,
        headers: impl Iterator<Item = (&'a OrderId, &'a HeaderRow)> + 'a,
    ) -> impl Iterator<Item = OrderRow> + 'a {
        headers.flat_map(move |(order_id, header)| {
            self.order_products
                .get(order_id)
                .into_iter()
                .flatten()
                .map(move |(product_id, line)| OrderRow {
                    order_id: *order_id,
                    created_at: header.created_at,
                    account_id: header.account_id.clone(),
                    total_price: header.total_price,
                    product_id: product_id.clone(),
                    quantity: line.quantity,
                    price: line.price,
                })
        })
    }
}

/// In-memory order repository for testing.
///
/// Mirrors the two-table layout of the PostgreSQL implementation. A write
/// stages every line item before publishing anything, so a failed write
/// leaves no trace. Failures can be injected to exercise that path.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail while inserting the line item at
    /// `index`, after the header and earlier items were staged. `None`
    /// clears the fault.
    pub async fn set_fail_on_product(&self, index: Option<usize>) {
        self.tables.write().await.fail_on_product = index;
    }

    /// Makes every operation fail as if storage were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.tables.write().await.unavailable = unavailable;
    }

    /// Returns how many writes got past validation and touched storage.
    pub async fn writes_started(&self) -> usize {
        self.tables.read().await.writes_started
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of stored line items across all orders.
    pub async fn line_item_count(&self) -> usize {
        self.tables
            .read()
            .await
            .order_products
            .values()
            .map(BTreeMap::len)
            .sum()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn put_order(&self, order: &Order) -> Result<()> {
        validate_order_for_put(order)?;

        let mut tables = self.tables.write().await;
        if tables.unavailable {
            return Err(OrderStoreError::StorageUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        tables.writes_started += 1;

        if tables.orders.contains_key(&order.id) {
            return Err(OrderStoreError::DuplicateOrder(order.id));
        }

        let header = HeaderRow {
            created_at: order.created_at,
            account_id: order.account_id.clone(),
            total_price: order.total_price,
        };

        let mut staged = BTreeMap::new();
        for (index, product) in order.products.iter().enumerate() {
            if tables.fail_on_product == Some(index) {
                return Err(OrderStoreError::StorageUnavailable(format!(
                    "injected failure on line item {index} of order {}",
                    order.id
                )));
            }
            staged.insert(
                product.id.clone(),
                LineRow {
                    quantity: product.quantity,
                    price: product.price,
                },
            );
        }

        tables.orders.insert(order.id, header);
        tables.order_products.insert(order.id, staged);
        Ok(())
    }

    async fn get_orders_for_account(&self, account_id: &AccountId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        if tables.unavailable {
            return Err(OrderStoreError::StorageUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }

        let headers = tables
            .orders
            .iter()
            .filter(|(_, header)| &header.account_id == account_id);
        assemble_orders(tables.joined_rows(headers))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        let tables = self.tables.read().await;
        if tables.unavailable {
            return Err(OrderStoreError::StorageUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }

        let headers = tables.orders.get_key_value(&order_id).into_iter();
        assemble_orders(tables.joined_rows(headers))?
            .pop()
            .ok_or(OrderStoreError::OrderNotFound(order_id))
    }
}

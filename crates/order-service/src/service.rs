//! Order service providing the create and read paths for orders.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use common::{AccountId, OrderId, ProductId};
use order_store::{Order, OrderRepository, OrderStoreError, OrderedProduct};
use serde::{Deserialize, Serialize};

use crate::clients::{AccountDirectory, CatalogProduct, ProductCatalog};
use crate::error::{Result, ServiceError};

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Service settings.
#[derive(Debug, Clone)]
pub struct OrderServiceConfig {
    /// Deadline for each repository call. Expiry abandons the call, which
    /// rolls back an in-flight write, and reports a transient error.
    pub request_timeout: Option<Duration>,
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Service for placing and listing orders.
///
/// Creation looks up the account and the catalog, snapshots catalog prices
/// into the line items, prices the order, assigns its ID and persists it.
/// Reads come straight from the repository and are enriched with catalog
/// display details; prices are never re-read from the catalog.
pub struct OrderService<R, A, C> {
    repository: R,
    accounts: A,
    catalog: C,
    config: OrderServiceConfig,
}

impl<R, A, C> OrderService<R, A, C>
where
    R: OrderRepository,
    A: AccountDirectory,
    C: ProductCatalog,
{
    /// Creates a new order service with default settings.
    pub fn new(repository: R, accounts: A, catalog: C) -> Self {
        Self::with_config(repository, accounts, catalog, OrderServiceConfig::default())
    }

    pub fn with_config(repository: R, accounts: A, catalog: C, config: OrderServiceConfig) -> Self {
        Self {
            repository,
            accounts,
            catalog,
            config,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Places an order for an account.
    #[tracing::instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn post_order(&self, account_id: AccountId, lines: Vec<OrderLine>) -> Result<Order> {
        let result = self.place_order(account_id, lines).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    items = order.products.len(),
                    total = %order.total_price,
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("orders_create_failed_total", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(error = %e, kind = %e.kind(), "order creation failed");
            }
        }

        result
    }

    async fn place_order(&self, account_id: AccountId, lines: Vec<OrderLine>) -> Result<Order> {
        validate_lines(&account_id, &lines)?;

        if !self.accounts.account_exists(&account_id).await? {
            return Err(ServiceError::AccountNotFound(account_id));
        }

        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id.clone()).collect();
        let catalog = self.catalog_by_id(&ids).await?;

        let products = lines
            .into_iter()
            .map(|line| {
                let product = catalog
                    .get(&line.product_id)
                    .ok_or_else(|| ServiceError::UnknownProduct(line.product_id.clone()))?;
                if product.price.is_negative() {
                    return Err(ServiceError::InvalidCatalogPrice {
                        product_id: line.product_id,
                        price: product.price,
                    });
                }
                Ok(
                    OrderedProduct::new(line.product_id, product.price, line.quantity)
                        .with_details(product.name.clone(), product.description.clone()),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let order = Order::place(account_id, products)?;
        self.with_deadline("put order", self.repository.put_order(&order))
            .await?;

        Ok(order)
    }

    /// Returns all orders of an account, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_orders_for_account(&self, account_id: &AccountId) -> Result<Vec<Order>> {
        if account_id.is_empty() {
            return Err(ServiceError::AccountIdRequired);
        }

        let mut orders = self
            .with_deadline(
                "get orders for account",
                self.repository.get_orders_for_account(account_id),
            )
            .await?;
        metrics::counter!("orders_read_total").increment(orders.len() as u64);

        self.enrich(&mut orders).await?;
        Ok(orders)
    }

    /// Returns one order by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self
            .with_deadline("get order", self.repository.get_order(order_id))
            .await?;

        let mut orders = vec![order];
        self.enrich(&mut orders).await?;
        Ok(orders.remove(0))
    }

    /// Fills line item names and descriptions from the catalog. Products
    /// the catalog no longer knows keep empty details.
    async fn enrich(&self, orders: &mut [Order]) -> Result<()> {
        let ids: Vec<ProductId> = orders
            .iter()
            .flat_map(|o| o.products.iter().map(|p| p.id.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let catalog = self.catalog_by_id(&ids).await?;
        for product in orders.iter_mut().flat_map(|o| o.products.iter_mut()) {
            if let Some(entry) = catalog.get(&product.id) {
                product.name.clone_from(&entry.name);
                product.description.clone_from(&entry.description);
            }
        }
        Ok(())
    }

    async fn catalog_by_id(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, CatalogProduct>> {
        Ok(self
            .catalog
            .get_products(ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect())
    }

    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = order_store::Result<T>>,
    ) -> Result<T> {
        let Some(limit) = self.config.request_timeout else {
            return Ok(call.await?);
        };

        match tokio::time::timeout(limit, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(OrderStoreError::TimedOut(operation).into()),
        }
    }
}

/// Rejects requests that could never be persisted, before any collaborator
/// or storage call.
fn validate_lines(account_id: &AccountId, lines: &[OrderLine]) -> Result<()> {
    if account_id.is_empty() {
        return Err(ServiceError::AccountIdRequired);
    }
    if lines.is_empty() {
        return Err(OrderStoreError::NoProducts.into());
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 || i32::try_from(line.quantity).is_err() {
            return Err(OrderStoreError::InvalidQuantity {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            }
            .into());
        }
        if !seen.insert(&line.product_id) {
            return Err(OrderStoreError::DuplicateProduct(line.product_id.clone()).into());
        }
    }
    Ok(())
}

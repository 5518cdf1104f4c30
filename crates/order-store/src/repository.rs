use std::collections::HashSet;

use async_trait::async_trait;

use crate::{AccountId, Order, OrderId, OrderStoreError, Result, pricing::compute_total};

/// Storage contract for orders.
///
/// Orders are write-once: there is no update or delete. All implementations
/// must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists an order together with all of its line items.
    ///
    /// Either the whole order becomes visible or none of it does. The order
    /// is validated with [`validate_order_for_put`] before storage is
    /// touched.
    async fn put_order(&self, order: &Order) -> Result<()>;

    /// Returns all orders of an account, ordered by order ID ascending, with
    /// line items ordered by product ID.
    ///
    /// An account without orders yields an empty list, not an error.
    async fn get_orders_for_account(&self, account_id: &AccountId) -> Result<Vec<Order>>;

    /// Returns a single order, or `OrderNotFound`.
    async fn get_order(&self, order_id: OrderId) -> Result<Order>;
}

/// Checks the write preconditions of an order.
///
/// An order must have at least one line item, every quantity must be
/// positive and fit an `INTEGER` column, prices must not be negative, a
/// product may appear only once, and the total must match the line items.
pub fn validate_order_for_put(order: &Order) -> Result<()> {
    if order.products.is_empty() {
        return Err(OrderStoreError::NoProducts);
    }

    let mut seen = HashSet::with_capacity(order.products.len());
    for product in &order.products {
        if product.quantity == 0 || i32::try_from(product.quantity).is_err() {
            return Err(OrderStoreError::InvalidQuantity {
                product_id: product.id.clone(),
                quantity: product.quantity,
            });
        }
        if product.price.is_negative() {
            return Err(OrderStoreError::NegativePrice {
                product_id: product.id.clone(),
                price: product.price,
            });
        }
        if !seen.insert(&product.id) {
            return Err(OrderStoreError::DuplicateProduct(product.id.clone()));
        }
    }

    let computed = compute_total(&order.products)?;
    if computed != order.total_price {
        return Err(OrderStoreError::TotalMismatch {
            stored: order.total_price,
            computed,
        });
    }

    Ok(())
}

//! Rebuilds nested orders from the flat rows of a header/line item join.

use chrono::{DateTime, Utc};

use crate::{AccountId, Money, Order, OrderId, OrderStoreError, OrderedProduct, ProductId, Result};

/// One row of the `orders JOIN order_products` result: the order header
/// repeated next to one of its line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRow {
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub account_id: AccountId,
    pub total_price: Money,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

impl OrderRow {
    fn product(&self) -> OrderedProduct {
        OrderedProduct::new(self.product_id.clone(), self.price, self.quantity)
    }

    fn into_order(self) -> Order {
        let product = self.product();
        Order {
            id: self.order_id,
            created_at: self.created_at,
            account_id: self.account_id,
            total_price: self.total_price,
            products: vec![product],
        }
    }
}

/// Groups consecutive rows of the same order into one [`Order`].
///
/// Rows must arrive sorted by order ID. Each row either extends the order
/// being assembled or completes it and starts the next one; the last order
/// is emitted by [`OrderAssembler::finish`].
#[derive(Debug, Default)]
pub struct OrderAssembler {
    orders: Vec<Order>,
    current: Option<Order>,
}

impl OrderAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next row.
    ///
    /// Fails if the row repeats a header with different values, or if an
    /// order reappears after it was already completed.
    pub fn push(&mut self, row: OrderRow) -> Result<()> {
        if let Some(order) = self.current.as_mut()
            && order.id == row.order_id
        {
            check_same_header(order, &row)?;
            order.products.push(row.product());
            return Ok(());
        }

        if let Some(previous) = self.current.as_ref()
            && row.order_id < previous.id
        {
            return Err(OrderStoreError::CorruptRow {
                order_id: row.order_id,
                reason: format!("rows out of order: {} after {}", row.order_id, previous.id),
            });
        }

        if let Some(completed) = self.current.take() {
            self.orders.push(completed);
        }
        self.current = Some(row.into_order());
        Ok(())
    }

    /// Number of orders completed so far, not counting the one in progress.
    pub fn completed(&self) -> usize {
        self.orders.len()
    }

    /// Emits the order in progress and returns all assembled orders.
    pub fn finish(mut self) -> Vec<Order> {
        if let Some(last) = self.current.take() {
            self.orders.push(last);
        }
        self.orders
    }
}

fn check_same_header(order: &Order, row: &OrderRow) -> Result<()> {
    let mismatch = if order.account_id != row.account_id {
        Some("account id")
    } else if order.created_at != row.created_at {
        Some("creation time")
    } else if order.total_price != row.total_price {
        Some("total price")
    } else {
        None
    };

    match mismatch {
        Some(field) => Err(OrderStoreError::CorruptRow {
            order_id: row.order_id,
            reason: format!("{field} differs between rows of the same order"),
        }),
        None => Ok(()),
    }
}

/// Assembles a complete row sequence in one pass.
pub fn assemble_orders(rows: impl IntoIterator<Item = OrderRow>) -> Result<Vec<Order>> {
    let mut assembler = OrderAssembler::new();
    for row in rows {
        assembler.push(row)?;
    }
    Ok(assembler.finish())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn order_id(n: u128) -> OrderId {
        OrderId::from_uuid(Uuid::from_u128(n))
    }

    fn row(order: u128, product: &str, quantity: u32, price: i64) -> OrderRow {
        OrderRow {
            order_id: order_id(order),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            account_id: AccountId::new("acc-1"),
            total_price: Money::from_cents(1000 * order as i64),
            product_id: ProductId::new(product),
            quantity,
            price: Money::from_cents(price),
        }
    }

    #[test]
    fn groups_rows_into_orders() {
        let rows = vec![
            row(1, "a", 1, 100),
            row(1, "b", 2, 200),
            row(1, "c", 3, 300),
            row(2, "d", 4, 400),
            row(2, "e", 5, 500),
        ];

        let orders = assemble_orders(rows).unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, order_id(1));
        assert_eq!(orders[0].products.len(), 3);
        assert_eq!(orders[1].id, order_id(2));
        assert_eq!(orders[1].products.len(), 2);

        let c = &orders[0].products[2];
        assert_eq!(c.id.as_str(), "c");
        assert_eq!(c.quantity, 3);
        assert_eq!(c.price, Money::from_cents(300));
        let e = &orders[1].products[1];
        assert_eq!(e.id.as_str(), "e");
        assert_eq!(e.quantity, 5);
        assert_eq!(orders[1].total_price, Money::from_cents(2000));
    }

    #[test]
    fn single_row_is_flushed() {
        let orders = assemble_orders(vec![row(7, "only", 1, 100)]).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].products.len(), 1);
        assert_eq!(orders[0].products[0].id.as_str(), "only");
    }

    #[test]
    fn trailing_single_item_order_is_flushed() {
        let orders =
            assemble_orders(vec![row(1, "a", 1, 100), row(1, "b", 1, 100), row(2, "c", 1, 100)])
                .unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].products.len(), 1);
    }

    #[test]
    fn no_rows_yield_no_orders() {
        assert!(assemble_orders(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn completed_counts_only_flushed_orders() {
        let mut assembler = OrderAssembler::new();
        assembler.push(row(1, "a", 1, 100)).unwrap();
        assert_eq!(assembler.completed(), 0);
        assembler.push(row(2, "b", 1, 100)).unwrap();
        assert_eq!(assembler.completed(), 1);
        assert_eq!(assembler.finish().len(), 2);
    }

    #[test]
    fn conflicting_header_is_rejected() {
        let mut second = row(1, "b", 1, 100);
        second.total_price = Money::from_cents(1);

        let err = assemble_orders(vec![row(1, "a", 1, 100), second]).unwrap_err();
        assert!(matches!(err, OrderStoreError::CorruptRow { .. }));
    }

    #[test]
    fn ungrouped_rows_are_rejected() {
        let err = assemble_orders(vec![row(2, "a", 1, 100), row(1, "b", 1, 100)]).unwrap_err();
        assert!(matches!(err, OrderStoreError::CorruptRow { .. }));
    }

    #[test]
    fn large_orders_are_not_truncated() {
        let rows = (0..5_000).map(|i| row(1, &format!("p{i:05}"), 1, 1));
        let orders = assemble_orders(rows).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].products.len(), 5_000);
    }
}

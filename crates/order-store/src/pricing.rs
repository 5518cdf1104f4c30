//! Order total calculation.

use crate::{Money, OrderStoreError, OrderedProduct, Result};

/// Sums `price * quantity` over the line items.
///
/// Uses the prices carried by the items themselves, which are the snapshot
/// taken when the order was placed. Overflow is rejected rather than
/// wrapped.
pub fn compute_total(products: &[OrderedProduct]) -> Result<Money> {
    products.iter().try_fold(Money::zero(), |total, product| {
        product
            .line_total()
            .and_then(|line| total.checked_add(line))
            .ok_or(OrderStoreError::PriceOverflow)
    })
}

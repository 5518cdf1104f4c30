use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Money, OrderId, ProductId, Result, pricing::compute_total};

/// A purchased product line, owned by exactly one [`Order`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedProduct {
    /// The catalog product identifier.
    pub id: ProductId,

    /// Display name, filled from the catalog.
    pub name: String,

    /// Display description, filled from the catalog.
    pub description: String,

    /// Unit price at the time of purchase.
    pub price: Money,

    /// Quantity ordered.
    pub quantity: u32,
}

impl OrderedProduct {
    /// Creates a line item without display details.
    pub fn new(id: impl Into<ProductId>, price: Money, quantity: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            price,
            quantity,
        }
    }

    /// Sets the display name and description.
    pub fn with_details(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }

    /// Returns `price * quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_multiply(self.quantity)
    }
}

/// Order aggregate root.
///
/// An order is a price snapshot: its total is fixed when the order is placed
/// and is never recomputed from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub account_id: AccountId,
    pub total_price: Money,
    pub products: Vec<OrderedProduct>,
}

impl Order {
    /// Places a new order: prices the line items, assigns a fresh ID, and
    /// stamps the creation time.
    ///
    /// The timestamp is truncated to microseconds, the precision PostgreSQL
    /// keeps, so a stored order reads back equal to the one placed.
    pub fn place(account_id: AccountId, products: Vec<OrderedProduct>) -> Result<Self> {
        let total_price = compute_total(&products)?;

        Ok(Self {
            id: OrderId::generate(),
            created_at: Utc::now().trunc_subsecs(6),
            account_id,
            total_price,
            products,
        })
    }

    /// Returns the number of line items.
    pub fn item_count(&self) -> usize {
        self.products.len()
    }

    /// Returns the total quantity over all line items.
    pub fn total_quantity(&self) -> u64 {
        self.products.iter().map(|p| u64::from(p.quantity)).sum()
    }
}

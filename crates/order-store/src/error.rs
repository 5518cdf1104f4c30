use thiserror::Error;

use crate::{Money, OrderId, ProductId};

/// Coarse classification of an [`OrderStoreError`], used by callers to decide
/// whether to reject, report, or retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller-supplied order failed a precondition check.
    Invalid,
    /// A single-entity lookup found nothing.
    NotFound,
    /// Storage connectivity or timeout; the caller may retry.
    Transient,
    /// Unexpected encode/decode failure or invariant violation.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Invalid => "invalid",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transient => "transient",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when persisting or reading orders.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// The order carries no line items.
    #[error("Order has no products")]
    NoProducts,

    /// A line item quantity is zero or does not fit the storage column.
    #[error("Invalid quantity for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// A line item has a negative unit price.
    #[error("Invalid price for product {product_id}: {price}")]
    NegativePrice { product_id: ProductId, price: Money },

    /// The same product appears twice in one order.
    #[error("Duplicate product in order: {0}")]
    DuplicateProduct(ProductId),

    /// The order total does not fit in a money amount.
    #[error("Order total overflows")]
    PriceOverflow,

    /// The order's stored total disagrees with its line items.
    #[error("Order total {stored} does not match line item total {computed}")]
    TotalMismatch { stored: Money, computed: Money },

    /// No order exists with the given ID.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with this ID was already persisted.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// A joined row contradicts the order it belongs to.
    #[error("Corrupt row for order {order_id}: {reason}")]
    CorruptRow { order_id: OrderId, reason: String },

    /// Storage could not be reached.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The caller's deadline expired before the operation finished.
    #[error("Operation timed out: {0}")]
    TimedOut(&'static str),

    /// A database error occurred.
    #[error("Database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl OrderStoreError {
    /// Returns a mapper that wraps a `sqlx::Error` with the operation it
    /// interrupted.
    pub fn database(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| OrderStoreError::Database { operation, source }
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderStoreError::NoProducts
            | OrderStoreError::InvalidQuantity { .. }
            | OrderStoreError::NegativePrice { .. }
            | OrderStoreError::DuplicateProduct(_)
            | OrderStoreError::PriceOverflow
            | OrderStoreError::TotalMismatch { .. } => ErrorKind::Invalid,
            OrderStoreError::OrderNotFound(_) => ErrorKind::NotFound,
            OrderStoreError::StorageUnavailable(_) | OrderStoreError::TimedOut(_) => {
                ErrorKind::Transient
            }
            OrderStoreError::Database { source, .. } => classify_sqlx_error(source),
            OrderStoreError::DuplicateOrder(_)
            | OrderStoreError::CorruptRow { .. }
            | OrderStoreError::Migration(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(source: sqlx::Error) -> Self {
        OrderStoreError::Database {
            operation: "query",
            source,
        }
    }
}

/// Connectivity problems and the PostgreSQL codes for serialization
/// failures, deadlocks, connection exhaustion, cancelled statements and the
/// connection exception class are transient; everything else is internal.
fn classify_sqlx_error(error: &sqlx::Error) -> ErrorKind {
    use sqlx::Error;

    match error {
        Error::Io(_)
        | Error::Tls(_)
        | Error::Protocol(_)
        | Error::PoolTimedOut
        | Error::PoolClosed
        | Error::WorkerCrashed => ErrorKind::Transient,
        Error::Database(db_err) => match db_err.code() {
            Some(code)
                if matches!(&*code, "40001" | "40P01" | "53300" | "57014")
                    || code.starts_with("08") =>
            {
                ErrorKind::Transient
            }
            _ => ErrorKind::Internal,
        },
        _ => ErrorKind::Internal,
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;

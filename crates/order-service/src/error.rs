//! Service error types.

use common::{AccountId, Money, ProductId};
use order_store::{ErrorKind, OrderStoreError};
use thiserror::Error;

/// Errors that can occur during order service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Account ID is required.
    #[error("Account ID is required")]
    AccountIdRequired,

    /// The account service does not know this account.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The catalog does not know this product.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// Account service error.
    #[error("Account service error: {0}")]
    AccountService(String),

    /// Catalog service error.
    #[error("Catalog service error: {0}")]
    CatalogService(String),

    /// The catalog returned a price no order can be placed at.
    #[error("Catalog returned invalid price {price} for product {product_id}")]
    InvalidCatalogPrice { product_id: ProductId, price: Money },

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),
}

impl ServiceError {
    /// Classifies this error with the store's taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::AccountIdRequired | ServiceError::UnknownProduct(_) => ErrorKind::Invalid,
            ServiceError::AccountNotFound(_) => ErrorKind::NotFound,
            ServiceError::AccountService(_) | ServiceError::CatalogService(_) => {
                ErrorKind::Transient
            }
            ServiceError::InvalidCatalogPrice { .. } => ErrorKind::Internal,
            ServiceError::Store(e) => e.kind(),
        }
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;

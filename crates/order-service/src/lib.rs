//! Order service layer.
//!
//! This crate provides:
//! - `OrderService`, which prices, identifies and persists new orders and
//!   reads them back per account
//! - Collaborator traits for the account and catalog services, with
//!   in-memory implementations
//! - `ServiceError`, classified with the store's `ErrorKind`

pub mod clients;
pub mod error;
pub mod service;

pub use clients::{
    AccountDirectory, CatalogProduct, InMemoryAccountDirectory, InMemoryProductCatalog,
    ProductCatalog,
};
pub use error::{Result, ServiceError};
pub use service::{OrderLine, OrderService, OrderServiceConfig};

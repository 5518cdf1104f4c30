//! Collaborator traits for the account and catalog services, with in-memory
//! implementations.

pub mod account;
pub mod catalog;

pub use account::{AccountDirectory, InMemoryAccountDirectory};
pub use catalog::{CatalogProduct, InMemoryProductCatalog, ProductCatalog};

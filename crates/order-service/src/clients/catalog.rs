//! Catalog service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ServiceError;

/// A product as the catalog currently describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
}

impl CatalogProduct {
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            price,
        }
    }
}

/// Point lookups against the catalog service.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns the known products among `ids`. Unknown IDs are omitted.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, CatalogProduct>,
    unavailable: bool,
    lookups: usize,
}

/// In-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryProductCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding `products`.
    pub fn with_products(products: impl IntoIterator<Item = CatalogProduct>) -> Self {
        let state = InMemoryCatalogState {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Adds or replaces a product.
    pub async fn upsert(&self, product: CatalogProduct) {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Configures the catalog to fail every lookup.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns how many lookups were served.
    pub async fn lookup_count(&self) -> usize {
        self.state.read().await.lookups
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, ServiceError> {
        let mut state = self.state.write().await;

        if state.unavailable {
            return Err(ServiceError::CatalogService(
                "catalog service unavailable".to_string(),
            ));
        }
        state.lookups += 1;

        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }
}

//! Process bootstrap: database connection with retry and catalog loading.

use std::time::Duration;

use order_service::{CatalogProduct, InMemoryProductCatalog};
use order_store::OrderStoreError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::Config;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The database stayed unreachable for every allowed attempt.
    #[error("Could not connect to database after {attempts} attempts: {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// Schema migrations failed.
    #[error("Migration failed: {0}")]
    Migration(#[from] OrderStoreError),

    /// The catalog file could not be read.
    #[error("Could not read catalog file {path}: {source}")]
    CatalogRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not a JSON array of products.
    #[error("Invalid catalog file: {0}")]
    CatalogParse(#[from] serde_json::Error),
}

/// Connects to PostgreSQL, retrying at a fixed interval.
///
/// `max_attempts == 0` retries until a connection succeeds.
pub async fn connect_with_retry(
    url: &str,
    max_connections: u32,
    interval: Duration,
    max_attempts: u32,
) -> Result<PgPool, StartupError> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        match PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
        {
            Ok(pool) => {
                if attempt > 1 {
                    tracing::info!(attempt, "database connection established after retry");
                }
                return Ok(pool);
            }
            Err(source) => {
                metrics::counter!("database_connect_failures_total").increment(1);

                if max_attempts > 0 && attempt >= max_attempts {
                    tracing::error!(attempt, error = %source, "giving up on database connection");
                    return Err(StartupError::Connect {
                        attempts: attempt,
                        source,
                    });
                }

                tracing::warn!(
                    attempt,
                    error = %source,
                    delay_ms = interval.as_millis() as u64,
                    "database connection failed, retrying after delay"
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Connects using the configured URL and retry policy.
pub async fn connect(config: &Config, url: &str) -> Result<PgPool, StartupError> {
    connect_with_retry(
        url,
        config.database_max_connections,
        config.startup_retry_interval,
        config.startup_max_attempts,
    )
    .await
}

/// Parses a JSON array of catalog products.
pub fn parse_catalog(json: &str) -> Result<InMemoryProductCatalog, StartupError> {
    let products: Vec<CatalogProduct> = serde_json::from_str(json)?;
    Ok(InMemoryProductCatalog::with_products(products))
}

/// Loads the catalog from `path`, or an empty catalog when no path is set.
pub async fn load_catalog(path: Option<&str>) -> Result<InMemoryProductCatalog, StartupError> {
    let Some(path) = path else {
        tracing::warn!("CATALOG_FILE not set, every product lookup will miss");
        return Ok(InMemoryProductCatalog::new());
    };

    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StartupError::CatalogRead {
            path: path.to_string(),
            source,
        })?;
    parse_catalog(&json)
}

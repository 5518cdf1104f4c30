//! HTTP API server for the order service.
//!
//! Exposes order creation and per-account listing over REST, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod startup;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use order_service::{
    InMemoryAccountDirectory, InMemoryProductCatalog, OrderService, OrderServiceConfig,
};
use order_store::OrderRepository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R: OrderRepository + 'static>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/accounts/{account_id}/orders",
            get(routes::orders::list_for_account::<R>).post(routes::orders::create::<R>),
        )
        .route("/orders/{id}", get(routes::orders::get::<R>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the application state around a repository.
pub fn create_state<R: OrderRepository>(
    repository: R,
    accounts: InMemoryAccountDirectory,
    catalog: InMemoryProductCatalog,
    config: &Config,
) -> Arc<AppState<R>> {
    let order_service = OrderService::with_config(
        repository,
        accounts,
        catalog,
        OrderServiceConfig {
            request_timeout: config.request_timeout,
        },
    );

    Arc::new(AppState { order_service })
}

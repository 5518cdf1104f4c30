//! API server entry point.

use api::config::{Config, LogFormat};
use api::startup;
use metrics_exporter_prometheus::PrometheusHandle;
use order_service::{InMemoryAccountDirectory, InMemoryProductCatalog};
use order_store::{InMemoryOrderRepository, OrderRepository, PostgresOrderRepository};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (text, json) = match config.log_format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

async fn serve<R: OrderRepository + 'static>(
    config: &Config,
    repository: R,
    catalog: InMemoryProductCatalog,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_state(
        repository,
        InMemoryAccountDirectory::accept_any(),
        catalog,
        config,
    );
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Load the product catalog
    let catalog = match startup::load_catalog(config.catalog_file.as_deref()).await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(error = %e, "failed to load catalog");
            std::process::exit(1);
        }
    };

    // 4. Pick the store and serve
    match config.database_url.clone() {
        Some(url) => {
            let repository = match connect_store(&config, &url).await {
                Ok(repository) => repository,
                Err(e) => {
                    tracing::error!(error = %e, "failed to prepare database");
                    std::process::exit(1);
                }
            };
            serve(&config, repository, catalog, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory only");
            serve(
                &config,
                InMemoryOrderRepository::new(),
                catalog,
                metrics_handle,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}

async fn connect_store(
    config: &Config,
    url: &str,
) -> Result<PostgresOrderRepository, startup::StartupError> {
    let pool = startup::connect(config, url).await?;
    let repository = PostgresOrderRepository::new(pool);
    repository.run_migrations().await?;
    tracing::info!("database ready");
    Ok(repository)
}

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use billing_engine::config::{Config, LogFormat, StoreBackend};
use billing_engine::invoices::{InMemoryInvoiceStore, InvoiceService, InvoiceStore, MySqlInvoiceStore};
use billing_engine::middleware::{json_config, path_config, ErrorHandler};
use billing_engine::modules;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!("Starting billing engine");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    let store = build_store(&config).await?;
    let service = Arc::new(InvoiceService::new(store, config.app.default_tax_rate));

    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(ErrorHandler)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(service.clone()))
            .app_data(json_config())
            .app_data(path_config())
            .configure(modules::configure)
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await.context("HTTP server terminated with an error")
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "billing_engine={},actix_web=info",
            config.app.log_level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn InvoiceStore>> {
    match config.database.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(InMemoryInvoiceStore::new()))
        }
        StoreBackend::MySql => {
            let pool = config
                .database
                .create_pool()
                .await
                .context("Failed to create database pool")?;

            tracing::info!(
                "Database pool initialized ({} connections)",
                config.database.pool_size
            );

            let store = MySqlInvoiceStore::new(pool);
            if config.database.run_migrations {
                store.migrate().await.context("Failed to run migrations")?;
                tracing::info!("Database migrations applied");
            }

            Ok(Arc::new(store))
        }
    }
}

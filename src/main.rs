use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tablefare::config::{Config, LogFormat};
use tablefare::middleware::{ErrorHandler, RequestId};
use tablefare::taxes::repositories::{
    InMemoryTaxStore, MySqlOrderTaxRepository, MySqlTaxRuleRepository,
};
use tablefare::taxes::TaxService;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("tablefare={},actix_web=info", config.app.log_level).into()
    });
    let json = config.app.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!("Starting Tablefare tax engine");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Tax currency: {}", config.app.currency);

    let currency = config.app.currency;
    let (service, pool) = match &config.database {
        Some(database) => {
            let pool = database
                .connect()
                .await
                .context("Failed to initialize the database")?;

            let service = TaxService::new(
                Arc::new(MySqlTaxRuleRepository::new(pool.clone())),
                Arc::new(MySqlOrderTaxRepository::new(pool.clone())),
                currency,
            );
            (service, Some(pool))
        }
        None => {
            if config.is_production() {
                anyhow::bail!("DATABASE_URL must be set in production");
            }
            tracing::warn!("DATABASE_URL not set, tax rules are kept in memory");

            let store = Arc::new(InMemoryTaxStore::new());
            (TaxService::new(store.clone(), store, currency), None)
        }
    };

    let service = Arc::new(service);
    let bind_address = config.server.bind_address();

    // Start HTTP server
    let server = HttpServer::new(move || {
        let mut app = App::new()
            .wrap(ErrorHandler)
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(service.clone()))
            .configure(tablefare::configure_app);
        if let Some(pool) = &pool {
            app = app.app_data(web::Data::new(pool.clone()));
        }
        app
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await.context("Server terminated with an error")
}

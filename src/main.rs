use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing::{error, info};

use splitx::config::{Config, StorageConfig};
use splitx::memory::MemoryStore;
use splitx::mongo::MongoStore;
use splitx::routes::{configure, AppState};
use splitx::store::SharedStore;

fn startup_error(err: impl std::fmt::Display) -> std::io::Error {
    error!("{}", err);
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(startup_error)?;

    let store: SharedStore = match &config.storage {
        StorageConfig::Mongo { uri, database } => {
            info!(database = %database, "Using MongoDB storage");
            Arc::new(MongoStore::connect(uri, database).await.map_err(startup_error)?)
        }
        StorageConfig::Memory => {
            info!("Using in-memory storage");
            Arc::new(MemoryStore::new())
        }
    };
    let state = AppState::new(store);

    info!(host = %config.host, port = config.port, "SplitX listening");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(state.clone()))
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

//! O2 Nutrition catalog import service

use anyhow::Result;
use o2_catalog::api::{router, AppState};
use o2_catalog::config::Config;
use o2_catalog::import::ImportDriver;
use o2_catalog::store::memory::{MemoryCatalog, MemoryRunStore};
use o2_catalog::store::postgres::{PgCatalogStore, PgImportRunStore};
use o2_catalog::store::uploads::DiskUploadStore;
use o2_catalog::store::{CatalogStore, ImportRunStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let db = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Some(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, catalog and import runs are kept in memory");
            None
        }
    };
    let catalog: Arc<dyn CatalogStore> = match &db {
        Some(db) => Arc::new(PgCatalogStore::new(db.clone())),
        None => Arc::new(MemoryCatalog::default()),
    };
    let runs: Arc<dyn ImportRunStore> = match db {
        Some(db) => Arc::new(PgImportRunStore::new(db)),
        None => Arc::new(MemoryRunStore::default()),
    };
    let uploads = Arc::new(DiskUploadStore::open(&config.upload_dir).await?);
    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, import events will not be published"); None }
        },
        None => None,
    };

    let driver = ImportDriver::new(catalog, runs, uploads).with_options(config.import);
    let app = router(AppState { driver, nats }, config.max_upload_bytes);

    tracing::info!("O2 Nutrition catalog import listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}

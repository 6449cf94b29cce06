//! Imports a local product CSV without going through the HTTP API.
//!
//! Usage: `import-csv <path> [--replace]`

use anyhow::{bail, Context, Result};
use o2_catalog::config::Config;
use o2_catalog::import::{DuplicatePolicy, ImportDriver};
use o2_catalog::store::memory::{MemoryCatalog, MemoryRunStore, MemoryUploadStore};
use o2_catalog::store::postgres::PgCatalogStore;
use o2_catalog::store::CatalogStore;
use o2_catalog::ImportReport;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();
    let config = Config::from_env()?;

    let mut path = None;
    let mut policy = config.import.policy;
    for arg in std::env::args().skip(1) {
        if arg == "--replace" {
            policy = DuplicatePolicy::Replace;
        } else if arg == "--skip" {
            policy = DuplicatePolicy::Skip;
        } else if path.is_none() {
            path = Some(arg);
        } else {
            bail!("unexpected argument `{arg}`\nusage: import-csv <path> [--replace]");
        }
    }
    let Some(path) = path else { bail!("usage: import-csv <path> [--replace]") };
    let contents = tokio::fs::read(&path).await.with_context(|| format!("reading {path}"))?;

    let catalog: Arc<dyn CatalogStore> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(2).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgCatalogStore::new(db))
        }
        None => Arc::new(MemoryCatalog::default()),
    };
    let driver = ImportDriver::new(catalog, Arc::new(MemoryRunStore::default()), Arc::new(MemoryUploadStore::default()))
        .with_options(config.import);

    let file_name = std::path::Path::new(&path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.clone());
    let mut run = driver.submit(&file_name, &contents).await?;
    let report = match driver.process_with(&mut run, policy).await {
        Ok(summary) => ImportReport::from_summary(&summary),
        Err(e) => ImportReport::failure(e.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("{}", run.results());
    if !report.success { std::process::exit(1); }
    Ok(())
}

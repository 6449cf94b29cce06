//! Postgres-backed catalog and import-run stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use crate::domain::aggregates::ImportRun;
use crate::{ExistingProduct, ProductId, ProductRecord, StoreError};
use super::{CatalogStore, ImportRunStore};

#[derive(Clone)]
pub struct PgCatalogStore {
    db: PgPool,
}

impl PgCatalogStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

const PRODUCT_COLUMNS: &str = "name, slug, price, original_price, category, subcategory, brand, description, image_url, images, rating, reviews, featured, trending, best_seller, loved_by_experts, on_sale, shop_by_goal, simple_flavors, variants, weight, nutrition_info, ingredients, certifications, nutrition_image";

/// Binds the product columns in `PRODUCT_COLUMNS` order, starting at `$2`.
macro_rules! bind_product {
    ($q:expr, $r:expr) => {
        $q.bind(&$r.name).bind(&$r.slug).bind($r.price).bind($r.original_price)
            .bind(&$r.category).bind(&$r.subcategory).bind(&$r.brand).bind(&$r.description)
            .bind(&$r.image_url).bind(&$r.images).bind($r.rating).bind($r.reviews.map(i64::from))
            .bind($r.featured).bind($r.trending).bind($r.best_seller).bind($r.loved_by_experts).bind($r.on_sale)
            .bind(&$r.shop_by_goal).bind(&$r.simple_flavors).bind(Json(&$r.variants)).bind(&$r.weight)
            .bind(&$r.nutrition_info).bind(&$r.ingredients).bind(&$r.certifications).bind(&$r.nutrition_image)
    };
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_by_name_or_slug(&self, name: &str, slug: &str) -> Result<Option<ExistingProduct>, StoreError> {
        let row: Option<(Uuid, String, String)> = sqlx::query_as("SELECT id, name, slug FROM products WHERE name = $1 OR slug = $2 ORDER BY created_at LIMIT 1")
            .bind(name).bind(slug).fetch_optional(&self.db).await?;
        Ok(row.map(|(id, name, slug)| ExistingProduct { id, name, slug }))
    }

    async fn create(&self, record: &ProductRecord) -> Result<ProductId, StoreError> {
        let id = Uuid::now_v7();
        let sql = format!(
            "INSERT INTO products (id, {PRODUCT_COLUMNS}, created_at, updated_at) VALUES ($1, {}, NOW(), NOW())",
            placeholders(2, 25)
        );
        bind_product!(sqlx::query(&sql).bind(id), record).execute(&self.db).await.map_err(write_error)?;
        Ok(id)
    }

    async fn replace(&self, id: ProductId, record: &ProductRecord) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE products SET ({PRODUCT_COLUMNS}, updated_at) = ({}, NOW()) WHERE id = $1",
            placeholders(2, 25)
        );
        let done = bind_product!(sqlx::query(&sql).bind(id), record).execute(&self.db).await.map_err(write_error)?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }
}

/// Unique violations (the slug index) become [`StoreError::Conflict`].
fn write_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Database(e)
}

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count).map(|i| format!("${i}")).collect::<Vec<_>>().join(", ")
}

#[derive(Clone)]
pub struct PgImportRunStore {
    db: PgPool,
}

impl PgImportRunStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[derive(sqlx::FromRow)]
struct ImportRunRow {
    id: Uuid,
    file_name: String,
    file: String,
    status: String,
    results: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ImportRunRow> for ImportRun {
    type Error = StoreError;

    fn try_from(r: ImportRunRow) -> Result<Self, Self::Error> {
        Ok(ImportRun::restore(r.id, r.file_name, r.file, r.status.parse()?, r.results, r.created_at, r.updated_at))
    }
}

#[async_trait]
impl ImportRunStore for PgImportRunStore {
    async fn insert(&self, run: &ImportRun) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO import_runs (id, file_name, file, status, results, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(run.id()).bind(run.file_name()).bind(run.file()).bind(run.status().as_str()).bind(run.results())
            .bind(run.created_at()).bind(run.updated_at())
            .execute(&self.db).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImportRun>, StoreError> {
        sqlx::query_as::<_, ImportRunRow>("SELECT * FROM import_runs WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await?
            .map(ImportRun::try_from).transpose()
    }

    async fn list(&self, limit: i64) -> Result<Vec<ImportRun>, StoreError> {
        sqlx::query_as::<_, ImportRunRow>("SELECT * FROM import_runs ORDER BY created_at DESC LIMIT $1")
            .bind(limit).fetch_all(&self.db).await?
            .into_iter().map(ImportRun::try_from).collect()
    }

    async fn save(&self, run: &ImportRun) -> Result<(), StoreError> {
        let done = sqlx::query("UPDATE import_runs SET status = $2, results = $3, updated_at = $4 WHERE id = $1")
            .bind(run.id()).bind(run.status().as_str()).bind(run.results()).bind(run.updated_at())
            .execute(&self.db).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn claim(&self, run: &ImportRun) -> Result<bool, StoreError> {
        let done = sqlx::query("UPDATE import_runs SET status = $2, results = $3, updated_at = $4 WHERE id = $1 AND status = 'uploaded'")
            .bind(run.id()).bind(run.status().as_str()).bind(run.results()).bind(run.updated_at())
            .execute(&self.db).await?;
        Ok(done.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_match_columns() {
        assert_eq!(PRODUCT_COLUMNS.split(", ").count(), 25);
        assert_eq!(placeholders(2, 3), "$2, $3, $4");
        assert!(placeholders(2, 25).ends_with("$26"));
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        assert!(matches!(write_error(sqlx::Error::RowNotFound), StoreError::Database(sqlx::Error::RowNotFound)));
    }
}

//! Storage seams: catalog products, import runs and uploaded files.
pub mod memory;
pub mod postgres;
pub mod uploads;

use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::aggregates::ImportRun;
use crate::{ExistingProduct, ProductId, ProductRecord, StoreError};

/// Product catalog the import writes into.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_name_or_slug(&self, name: &str, slug: &str) -> Result<Option<ExistingProduct>, StoreError>;
    async fn create(&self, record: &ProductRecord) -> Result<ProductId, StoreError>;
    /// Overwrites every imported field of an existing product.
    ///
    /// Both writes fail with [`StoreError::Conflict`] when the slug belongs to another product.
    async fn replace(&self, id: ProductId, record: &ProductRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ImportRunStore: Send + Sync {
    async fn insert(&self, run: &ImportRun) -> Result<(), StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<ImportRun>, StoreError>;
    /// Newest first.
    async fn list(&self, limit: i64) -> Result<Vec<ImportRun>, StoreError>;
    /// Persists status, results and timestamps of an existing run.
    async fn save(&self, run: &ImportRun) -> Result<(), StoreError>;
    /// Saves a run that has just moved to `processing`, but only while the
    /// stored copy is still `uploaded`. Returns `false` when it is not.
    async fn claim(&self, run: &ImportRun) -> Result<bool, StoreError>;
}

/// Blob storage for uploaded import files.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Stores the file and returns its key.
    async fn put(&self, file_name: &str, contents: &[u8]) -> Result<String, StoreError>;
    async fn read_to_string(&self, key: &str) -> Result<String, StoreError>;
}

//! In-memory stores for tests, local runs and the standalone importer.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;
use crate::domain::aggregates::ImportRun;
use crate::{ExistingProduct, ImportStatus, ProductId, ProductRecord, StoreError};
use super::{CatalogStore, ImportRunStore, UploadStore};

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: RwLock<Vec<(ProductId, ProductRecord)>>,
    offline: AtomicBool,
}

impl MemoryCatalog {
    /// Catalog whose every call fails with [`StoreError::Unavailable`].
    pub fn unreachable() -> Self {
        Self { products: RwLock::default(), offline: AtomicBool::new(true) }
    }

    pub async fn products(&self) -> Vec<ProductRecord> {
        self.products.read().await.iter().map(|(_, p)| p.clone()).collect()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("catalog store is offline".into()));
        }
        Ok(())
    }
}

/// Slugs are unique across the catalog, as in the Postgres schema.
fn check_slug(products: &[(ProductId, ProductRecord)], id: Option<ProductId>, slug: &str) -> Result<(), StoreError> {
    if products.iter().any(|(pid, p)| Some(*pid) != id && p.slug == slug) {
        return Err(StoreError::Conflict(format!("slug `{slug}` is already taken")));
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_by_name_or_slug(&self, name: &str, slug: &str) -> Result<Option<ExistingProduct>, StoreError> {
        self.check()?;
        Ok(self.products.read().await.iter()
            .find(|(_, p)| p.name == name || p.slug == slug)
            .map(|(id, p)| ExistingProduct { id: *id, name: p.name.clone(), slug: p.slug.clone() }))
    }

    async fn create(&self, record: &ProductRecord) -> Result<ProductId, StoreError> {
        self.check()?;
        let mut products = self.products.write().await;
        check_slug(&products, None, &record.slug)?;
        let id = Uuid::now_v7();
        products.push((id, record.clone()));
        Ok(id)
    }

    async fn replace(&self, id: ProductId, record: &ProductRecord) -> Result<(), StoreError> {
        self.check()?;
        let mut products = self.products.write().await;
        check_slug(&products, Some(id), &record.slug)?;
        let slot = products.iter_mut().find(|(pid, _)| *pid == id).ok_or(StoreError::NotFound)?;
        slot.1 = record.clone();
        Ok(())
    }
}

/// Run store that also keeps every saved `(status, results)` pair.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<Uuid, ImportRun>>,
    history: RwLock<Vec<(Uuid, ImportStatus, String)>>,
    reject_progress: AtomicBool,
}

impl MemoryRunStore {
    /// Store that accepts the move to `processing` but fails every later
    /// progress write.
    pub fn rejecting_progress() -> Self {
        Self { reject_progress: AtomicBool::new(true), ..Default::default() }
    }

    pub async fn history(&self, id: Uuid) -> Vec<(ImportStatus, String)> {
        self.history.read().await.iter().filter(|(rid, _, _)| *rid == id).map(|(_, s, r)| (*s, r.clone())).collect()
    }
}

#[async_trait]
impl ImportRunStore for MemoryRunStore {
    async fn insert(&self, run: &ImportRun) -> Result<(), StoreError> {
        self.runs.write().await.insert(run.id(), run.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImportRun>, StoreError> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn list(&self, limit: i64) -> Result<Vec<ImportRun>, StoreError> {
        let mut runs: Vec<_> = self.runs.read().await.values().cloned().collect();
        runs.sort_by_key(|r| std::cmp::Reverse(r.created_at()));
        runs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(runs)
    }

    async fn save(&self, run: &ImportRun) -> Result<(), StoreError> {
        if run.status() == ImportStatus::Processing && self.reject_progress.load(Ordering::Relaxed)
            && self.history.read().await.iter().any(|(rid, s, _)| *rid == run.id() && *s == ImportStatus::Processing)
        {
            return Err(StoreError::Unavailable("run store rejected the write".into()));
        }
        let mut runs = self.runs.write().await;
        if !runs.contains_key(&run.id()) { return Err(StoreError::NotFound); }
        runs.insert(run.id(), run.clone());
        self.history.write().await.push((run.id(), run.status(), run.results().to_string()));
        Ok(())
    }

    async fn claim(&self, run: &ImportRun) -> Result<bool, StoreError> {
        let mut runs = self.runs.write().await;
        let stored = runs.get(&run.id()).ok_or(StoreError::NotFound)?;
        if stored.status() != ImportStatus::Uploaded { return Ok(false); }
        runs.insert(run.id(), run.clone());
        self.history.write().await.push((run.id(), run.status(), run.results().to_string()));
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct MemoryUploadStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    async fn put(&self, file_name: &str, contents: &[u8]) -> Result<String, StoreError> {
        let key = format!("{}-{}", Uuid::now_v7(), file_name);
        self.files.write().await.insert(key.clone(), contents.to_vec());
        Ok(key)
    }

    async fn read_to_string(&self, key: &str) -> Result<String, StoreError> {
        let files = self.files.read().await;
        let bytes = files.get(key).ok_or(StoreError::NotFound)?;
        String::from_utf8(bytes.clone()).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catalog_replace() {
        let catalog = MemoryCatalog::default();
        let mut r = ProductRecord { name: "Whey".into(), slug: "whey".into(), price: 10.0, ..Default::default() };
        let id = catalog.create(&r).await.unwrap();
        r.price = 12.0;
        catalog.replace(id, &r).await.unwrap();
        assert_eq!(catalog.products().await[0].price, 12.0);
        assert!(matches!(catalog.replace(Uuid::nil(), &r).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_catalog_slug_conflict() {
        let catalog = MemoryCatalog::default();
        let whey = ProductRecord { name: "Whey".into(), slug: "whey".into(), ..Default::default() };
        let id = catalog.create(&whey).await.unwrap();
        catalog.create(&ProductRecord { name: "Casein".into(), slug: "casein".into(), ..Default::default() }).await.unwrap();

        let clash = ProductRecord { name: "Whey 2".into(), slug: "casein".into(), ..Default::default() };
        assert!(matches!(catalog.create(&clash).await, Err(StoreError::Conflict(_))));
        assert!(matches!(catalog.replace(id, &clash).await, Err(StoreError::Conflict(_))));
        catalog.replace(id, &whey).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_catalog() {
        let catalog = MemoryCatalog::unreachable();
        assert!(matches!(catalog.find_by_name_or_slug("a", "a").await, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_run_store_save_requires_insert() {
        let store = MemoryRunStore::default();
        let run = ImportRun::create("a.csv", "a");
        assert!(matches!(store.save(&run).await, Err(StoreError::NotFound)));
        store.insert(&run).await.unwrap();
        store.save(&run).await.unwrap();
        assert_eq!(store.history(run.id()).await, vec![(ImportStatus::Uploaded, String::new())]);
        assert_eq!(store.list(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_only_from_uploaded() {
        let store = MemoryRunStore::default();
        let mut run = ImportRun::create("a.csv", "a");
        store.insert(&run).await.unwrap();
        run.begin_processing().unwrap();
        assert!(store.claim(&run).await.unwrap());
        assert!(!store.claim(&run).await.unwrap());
        assert!(matches!(store.claim(&ImportRun::create("b.csv", "b")).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_upload_round_trip() {
        let uploads = MemoryUploadStore::default();
        let key = uploads.put("p.csv", b"name,price").await.unwrap();
        assert_eq!(uploads.read_to_string(&key).await.unwrap(), "name,price");
        assert!(uploads.read_to_string("missing").await.is_err());
    }
}

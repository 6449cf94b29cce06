//! Duplicate detection against the catalog store.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::store::CatalogStore;
use crate::{ExistingProduct, ProductRecord, StoreError};

/// What to do with a row whose product already exists. Fixed for a whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Skip,
    Replace,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            other => Err(format!("unknown duplicate policy `{other}` (expected skip or replace)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    NotFound,
    Exists(ExistingProduct),
}

#[derive(Clone)]
pub struct DuplicateResolver {
    catalog: Arc<dyn CatalogStore>,
}

impl DuplicateResolver {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self { Self { catalog } }

    /// Looks for a catalog product with the same name or the same slug.
    pub async fn resolve(&self, record: &ProductRecord) -> Result<Resolution, StoreError> {
        Ok(match self.catalog.find_by_name_or_slug(&record.name, &record.slug).await? {
            Some(existing) => Resolution::Exists(existing),
            None => Resolution::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCatalog;

    fn record(name: &str, slug: &str) -> ProductRecord {
        ProductRecord { name: name.into(), slug: slug.into(), price: 10.0, ..Default::default() }
    }

    #[tokio::test]
    async fn test_resolve_by_name_or_slug() {
        let catalog = Arc::new(MemoryCatalog::default());
        let id = catalog.create(&record("Whey Protein", "whey-protein")).await.unwrap();
        let resolver = DuplicateResolver::new(catalog);

        assert!(matches!(resolver.resolve(&record("Whey Protein", "other")).await.unwrap(), Resolution::Exists(e) if e.id == id));
        assert!(matches!(resolver.resolve(&record("WHEY protein", "whey-protein")).await.unwrap(), Resolution::Exists(_)));
        assert_eq!(resolver.resolve(&record("Casein", "casein")).await.unwrap(), Resolution::NotFound);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(" Replace ".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Replace));
        assert_eq!("skip".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Skip));
        assert!("merge".parse::<DuplicatePolicy>().is_err());
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::Skip);
    }
}

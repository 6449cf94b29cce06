//! Uploaded files kept on local disk.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use crate::StoreError;
use super::UploadStore;

#[derive(Clone, Debug)]
pub struct DiskUploadStore {
    root: PathBuf,
}

impl DiskUploadStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    /// Keys are plain file names; anything that could escape the root is refused.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::NotFound);
        }
        Ok(self.root.join(key))
    }
}

fn sanitize(file_name: &str) -> String {
    let cleaned: String = file_name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() { "upload.csv".to_string() } else { cleaned.to_string() }
}

#[async_trait]
impl UploadStore for DiskUploadStore {
    async fn put(&self, file_name: &str, contents: &[u8]) -> Result<String, StoreError> {
        let key = format!("{}-{}", Uuid::now_v7(), sanitize(file_name));
        tokio::fs::write(self.path_for(&key)?, contents).await?;
        Ok(key)
    }

    async fn read_to_string(&self, key: &str) -> Result<String, StoreError> {
        Ok(tokio::fs::read_to_string(self.path_for(key)?).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize("products 2024.csv"), "products_2024.csv");
        assert_eq!(sanitize("..."), "upload.csv");
    }

    #[tokio::test]
    async fn test_disk_round_trip() {
        let dir = std::env::temp_dir().join(format!("o2-uploads-{}", Uuid::new_v4()));
        let store = DiskUploadStore::open(&dir).await.unwrap();
        let key = store.put("products.csv", b"Whey,1999").await.unwrap();
        assert!(key.ends_with("-products.csv"));
        assert_eq!(store.read_to_string(&key).await.unwrap(), "Whey,1999");
        assert!(matches!(store.read_to_string("../secret").await, Err(StoreError::NotFound)));
        assert!(matches!(store.read_to_string("missing.csv").await, Err(StoreError::Io(_))));
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}

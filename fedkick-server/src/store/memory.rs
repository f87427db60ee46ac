use super::{BlobStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// In-memory [`BlobStore`].
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.blobs.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let blobs = self.blobs.read().await;
        Ok(blobs
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_list_by_prefix_with_limit() -> Result<(), StoreError> {
        let store = MemoryStore::default();
        for key in ["updates/a/1", "updates/a/2", "updates/a/3", "updates/b/1", "models/a"] {
            store.set(key, key.to_string()).await?;
        }
        assert_eq!(store.list("updates/a/", 10).await?.len(), 3);
        assert_eq!(store.list("updates/a/", 2).await?, vec!["updates/a/1", "updates/a/2"]);
        assert_eq!(store.list("updates/c/", 10).await?.len(), 0);

        store.delete("updates/a/2").await?;
        store.delete("updates/a/2").await?;
        assert_eq!(store.get("updates/a/2").await?, None);
        assert_eq!(store.get("updates/a/3").await?.as_deref(), Some("updates/a/3"));
        assert_eq!(store.len().await, 4);
        Ok(())
    }
}

use super::{BlobStore, StoreError};
use async_trait::async_trait;
use log::trace;
use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use tokio::fs;

/// [`BlobStore`] keeping one file per key under a root directory.
///
/// Values are written to a hidden temporary file next to the target and
/// renamed over it, so readers see either the old or the new value.
///
/// Listing is not recursive: the prefix up to its last `/` names a directory,
/// and the rest filters the file names in it.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Creates the store, creating the root directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        let valid = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(s) if !s.to_string_lossy().starts_with('.')));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)?).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let path = self.path(key)?;
        let (dir, name) = match (path.parent(), path.file_name()) {
            (Some(dir), Some(name)) => (dir, name.to_string_lossy()),
            _ => return Err(StoreError::InvalidKey(key.to_string())),
        };
        fs::create_dir_all(dir).await?;
        let tmp = dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));
        fs::write(&tmp, value).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        trace!("Wrote {}", path.display());
        Ok(())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let (dir_key, name_prefix) = match prefix.rfind('/') {
            Some(i) => (&prefix[..i], &prefix[i + 1..]),
            None => ("", prefix),
        };
        let dir = if dir_key.is_empty() {
            self.root.clone()
        } else {
            self.path(dir_key)?
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') && name.starts_with(name_prefix) {
                names.push(name);
            }
        }
        names.sort();

        Ok(names
            .into_iter()
            .take(limit)
            .map(|name| match dir_key {
                "" => name,
                d => format!("{}/{}", d, name),
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[tokio::test]
    async fn test_set_get_list_delete() -> anyhow::Result<()> {
        let dir = TempDir::new("fs_store")?;
        let store = FsStore::new(dir.path())?;

        assert_eq!(store.get("models/fred/latest.json").await?, None);
        store.set("models/fred/latest.json", "{}".into()).await?;
        store.set("models/fred/latest.json", "{\"v\":1}".into()).await?;
        assert_eq!(
            store.get("models/fred/latest.json").await?.as_deref(),
            Some("{\"v\":1}")
        );

        store.set("updates/fred/b.json", "b".into()).await?;
        store.set("updates/fred/a.json", "a".into()).await?;
        store.set("updates/gregory/c.json", "c".into()).await?;
        assert_eq!(
            store.list("updates/fred/", 10).await?,
            vec!["updates/fred/a.json", "updates/fred/b.json"]
        );
        assert_eq!(store.list("updates/fred/", 1).await?, vec!["updates/fred/a.json"]);
        assert!(store.list("updates/nobody/", 10).await?.is_empty());

        store.delete("updates/fred/a.json").await?;
        store.delete("updates/fred/a.json").await?;
        assert_eq!(store.list("updates/fred/", 10).await?, vec!["updates/fred/b.json"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_keys_escaping_the_root() -> anyhow::Result<()> {
        let dir = TempDir::new("fs_store")?;
        let store = FsStore::new(dir.path())?;
        assert!(store.set("../outside.json", "x".into()).await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
        assert!(store.get("models/.hidden").await.is_err());
        Ok(())
    }
}

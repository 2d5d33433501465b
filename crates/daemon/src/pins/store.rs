use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::prelude::ContentId;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum PinStoreError {
    #[error("content identifier is empty")]
    EmptyIdentifier,
    #[error("failed to read pin list {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse pin list {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write pin list {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode pin list: {0}")]
    Encode(#[source] serde_json::Error),
}

/// The user's pin intent: an ordered, duplicate-free list of content
/// identifiers mirrored to a JSON file.
///
/// Identifiers are kept in [`ContentId::canonicalize`] form, so `/ipfs/<cid>`
/// and `<cid>` are the same entry.
///
/// Every mutation rewrites the whole file while holding the list lock, so
/// concurrent `add`/`remove` calls can neither lose updates nor interleave
/// writes. Cloning is cheap and shares the same list.
#[derive(Debug, Clone)]
pub struct PinStore {
    path: PathBuf,
    pins: Arc<Mutex<Vec<String>>>,
}

impl PinStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pins: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory list with the persisted one.
    ///
    /// A missing file is the first-run state and yields an empty list. On a
    /// read or parse error the in-memory list is left as it was.
    pub async fn load(&self) -> Result<usize, PinStoreError> {
        let mut pins = self.pins.lock().await;

        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no pin list at {}, starting empty", self.path.display());
                pins.clear();
                return Ok(0);
            }
            Err(source) => {
                return Err(PinStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let loaded: Vec<String> =
            serde_json::from_slice(&data).map_err(|source| PinStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let mut deduped: Vec<String> = Vec::with_capacity(loaded.len());
        for raw in loaded {
            let id = ContentId::canonicalize(&raw);
            if id.is_empty() || deduped.contains(&id) {
                tracing::warn!(id = raw, "dropping empty or duplicate pin list entry");
                continue;
            }
            deduped.push(id);
        }

        *pins = deduped;
        tracing::info!("loaded {} pins from {}", pins.len(), self.path.display());
        Ok(pins.len())
    }

    /// Write the current list to disk.
    pub async fn save(&self) -> Result<(), PinStoreError> {
        let pins = self.pins.lock().await;
        write_atomic(&self.path, pins.clone()).await
    }

    /// Append `id` and persist. Returns `false` without touching the file if
    /// it is already present.
    ///
    /// If persisting fails the in-memory list keeps the new entry and the
    /// error is returned.
    pub async fn add(&self, id: &str) -> Result<bool, PinStoreError> {
        let id = ContentId::canonicalize(id);
        if id.is_empty() {
            return Err(PinStoreError::EmptyIdentifier);
        }

        let mut pins = self.pins.lock().await;
        if pins.contains(&id) {
            return Ok(false);
        }
        pins.push(id);
        write_atomic(&self.path, pins.clone()).await?;
        Ok(true)
    }

    /// Remove the first occurrence of `id` and persist. Removing an absent
    /// identifier is a no-op and returns `false`.
    pub async fn remove(&self, id: &str) -> Result<bool, PinStoreError> {
        let id = ContentId::canonicalize(id);
        let mut pins = self.pins.lock().await;
        let Some(index) = pins.iter().position(|p| *p == id) else {
            return Ok(false);
        };
        pins.remove(index);
        write_atomic(&self.path, pins.clone()).await?;
        Ok(true)
    }

    /// Snapshot of the current list, in insertion order.
    pub async fn list(&self) -> Vec<String> {
        self.pins.lock().await.clone()
    }
}

/// Serialize to a temp file next to `path`, fsync, then rename over it.
async fn write_atomic(path: &Path, pins: Vec<String>) -> Result<(), PinStoreError> {
    let data = serde_json::to_vec(&pins).map_err(PinStoreError::Encode)?;
    let target = path.to_path_buf();

    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)
    .and_then(|r| r);

    result.map_err(|source| PinStoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> PinStore {
        PinStore::new(dir.path().join(".tz-vertex_pinlist.json"))
    }

    async fn on_disk(store: &PinStore) -> Vec<String> {
        let data = tokio::fs::read(store.path()).await.unwrap();
        serde_json::from_slice(&data).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load().await.unwrap(), 0);
        assert!(store.list().await.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_add_remove_scenario() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.load().await.unwrap();

        assert!(store.add("bafkreiABC").await.unwrap());
        assert_eq!(store.list().await, vec!["bafkreiABC"]);
        assert_eq!(on_disk(&store).await, vec!["bafkreiABC"]);
        assert_eq!(
            tokio::fs::read_to_string(store.path()).await.unwrap(),
            r#"["bafkreiABC"]"#
        );

        assert!(store.remove("bafkreiABC").await.unwrap());
        assert!(store.list().await.is_empty());
        assert_eq!(on_disk(&store).await, Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for id in ["c", "a", "b"] {
            store.add(id).await.unwrap();
        }
        store.save().await.unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.load().await.unwrap(), 3);
        assert_eq!(reloaded.list().await, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("cidA").await.unwrap();

        assert!(!store.remove("cidX").await.unwrap());
        assert_eq!(store.list().await, vec!["cidA"]);
        assert_eq!(on_disk(&store).await, vec!["cidA"]);
    }

    #[tokio::test]
    async fn test_remove_takes_first_occurrence_only() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for id in ["a", "b", "c"] {
            store.add(id).await.unwrap();
        }
        store.remove("b").await.unwrap();
        assert_eq!(store.list().await, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.add("cidA").await.unwrap());
        assert!(!store.add(" cidA ").await.unwrap());
        assert_eq!(store.list().await, vec!["cidA"]);
    }

    #[tokio::test]
    async fn test_path_and_bare_cid_are_one_entry() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let cid = "bafkreidtuosuw37f5xmn65b3ksdiikajy7pwjjslzj2lxxz2vc4wdy3zku";

        assert!(store.add(&format!("/ipfs/{}", cid)).await.unwrap());
        assert!(!store.add(cid).await.unwrap());
        assert_eq!(store.list().await, vec![cid]);
        assert_eq!(on_disk(&store).await, vec![cid]);

        assert!(store.remove(&format!(" /ipfs/{}", cid)).await.unwrap());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_canonicalizes_entries() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let cid = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
        tokio::fs::write(
            store.path(),
            serde_json::to_vec(&vec![format!("/ipfs/{}", cid), cid.to_string()]).unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(store.load().await.unwrap(), 1);
        assert_eq!(store.list().await, vec![cid]);
    }

    #[tokio::test]
    async fn test_empty_add_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.add("  ").await,
            Err(PinStoreError::EmptyIdentifier)
        ));
        assert!(matches!(
            store.add("/ipfs/").await,
            Err(PinStoreError::EmptyIdentifier)
        ));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_keeps_memory_state() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add("cidA").await.unwrap();

        tokio::fs::write(store.path(), b"{ not json").await.unwrap();
        assert!(matches!(
            store.load().await,
            Err(PinStoreError::Parse { .. })
        ));
        assert_eq!(store.list().await, vec!["cidA"]);
    }

    #[tokio::test]
    async fn test_load_drops_duplicates_and_blanks() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), br#"["a", "", "b", "a"]"#)
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap(), 2);
        assert_eq!(store.list().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = PinStore::new(dir.path().join("nested").join("pins.json"));
        store.add("cidA").await.unwrap();
        assert_eq!(on_disk(&store).await, vec!["cidA"]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let handles: Vec<_> = (0..32)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move { store.add(&format!("cid{}", n)).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        let mut listed = store.list().await;
        let mut persisted = on_disk(&store).await;
        assert_eq!(listed.len(), 32);
        assert_eq!(listed, persisted);
        listed.sort();
        persisted.sort();
        assert_eq!(listed, persisted);
    }
}

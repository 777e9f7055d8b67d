// # File History Store
//
// File-based implementation of HistoryStore.
//
// ## Load
//
// - Missing file: empty store, not an error
// - Unreadable file (permissions, directory): `StoreUnavailable`
// - Unparseable content or malformed fingerprint: `StoreCorrupt`
//
// A corrupt store is reported, never replaced. The `.backup` copy written
// by the previous flush is the operator's way back.
//
// ## Flush
//
// - Atomic writes: new content goes to `<store>.tmp`, then is renamed over the store
// - Backup: the previous store is copied to `<store>.backup` first
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "example.com/TXT": "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::fingerprint::Fingerprint;
use crate::traits::history_store::HistoryStore;

/// Store file format version
/// Used for future migration if format changes
const STORE_FILE_VERSION: &str = "1.0";

/// File-based history store
///
/// # Example
///
/// ```rust,no_run
/// use rrwatch_core::{Fingerprint, HistoryStore};
/// use rrwatch_core::store::FileHistoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileHistoryStore::load("/tmp/dns_rr_store").await?;
///
///     store.update("example.com/TXT", Fingerprint::compute("\"hello\"\n")).await?;
///     store.flush().await?;
///
///     let fp = store.query("example.com/TXT").await?;
///     assert!(fp.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileHistoryStore {
    path: PathBuf,
    records: Arc<RwLock<BTreeMap<String, Fingerprint>>>,
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    records: BTreeMap<String, Fingerprint>,
}

impl FileHistoryStore {
    /// Load the store at `path`, or start empty if the file does not exist
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let records = Self::read_records(&path).await?;

        tracing::debug!(
            "Loaded history store {}: {} records",
            path.display(),
            records.len()
        );

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the store file
    async fn read_records(path: &Path) -> Result<BTreeMap<String, Fingerprint>, Error> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Store file does not exist, starting empty: {}", path.display());
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(Error::store_unavailable(format!(
                    "Failed to read store file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        // Parsing also validates every fingerprint (see Fingerprint::parse)
        let store_file: StoreFileFormat = serde_json::from_slice(&content).map_err(|e| {
            Error::store_corrupt(format!(
                "Failed to parse store file {}: {}. \
                The previous copy may be available at {}",
                path.display(),
                e,
                Self::backup_path(path).display()
            ))
        })?;

        if store_file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STORE_FILE_VERSION,
                store_file.version
            );
        }

        Ok(store_file.records)
    }

    /// Write and sync the temp file
    ///
    /// tokio's `File` reports a failed background write on the next
    /// flush, so flush before syncing.
    async fn fill_temp(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await
    }

    /// Write the store to disk atomically
    async fn write_records(&self) -> Result<(), Error> {
        let guard = self.records.read().await;

        let store_file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            records: guard.clone(),
        };
        drop(guard);

        let json = serde_json::to_string_pretty(&store_file)
            .map_err(|e| Error::store_write(format!("Failed to serialize store: {}", e)))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::store_write(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Write to temporary file first
        let temp_path = Self::temp_path(&self.path);
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            Error::store_write(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        if let Err(e) = Self::fill_temp(&mut file, json.as_bytes()).await {
            drop(file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::store_write(format!(
                "Failed to write temp file {}: {}",
                temp_path.display(),
                e
            )));
        }
        drop(file);

        // Keep the previous good copy around
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create store backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::store_write(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )));
        }

        tracing::trace!("History store written: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(path: &Path) -> PathBuf {
        Self::sibling_with_suffix(path, "tmp")
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        Self::sibling_with_suffix(path, "backup")
    }

    // Appends rather than replaces the extension: the default store path
    // has none, and "store.json" must not collide with "store.tmp" siblings.
    fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn query(&self, key: &str) -> Result<Option<Fingerprint>, Error> {
        let guard = self.records.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn update(&self, key: &str, fingerprint: Fingerprint) -> Result<(), Error> {
        tracing::debug!("Storing in memory: {} -> {}", key, fingerprint);
        let mut guard = self.records.write().await;
        guard.insert(key.to_string(), fingerprint);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        self.write_records().await
    }

    async fn dump(&self) -> Result<BTreeMap<String, Fingerprint>, Error> {
        let guard = self.records.read().await;
        Ok(guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let store = FileHistoryStore::load(&path).await.unwrap();
        assert!(store.dump().await.unwrap().is_empty());
        assert_eq!(store.query("example.com/TXT").await.unwrap(), None);

        // Loading alone never creates the file
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let store = FileHistoryStore::load(&path).await.unwrap();
        let a = Fingerprint::compute("1.2.3.4\n");
        let b = Fingerprint::compute("\"v=spf1 -all\"\n");
        store.update("example.com/A", a.clone()).await.unwrap();
        store.update("example.com/TXT", b.clone()).await.unwrap();
        store.flush().await.unwrap();

        let reloaded = FileHistoryStore::load(&path).await.unwrap();
        assert_eq!(reloaded.dump().await.unwrap(), store.dump().await.unwrap());
        assert_eq!(reloaded.query("example.com/A").await.unwrap(), Some(a));
        assert_eq!(reloaded.query("example.com/TXT").await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn test_update_overwrites_single_entry() {
        let dir = tempdir().unwrap();
        let store = FileHistoryStore::load(dir.path().join("store")).await.unwrap();

        store.update("k", Fingerprint::compute("old")).await.unwrap();
        store.update("k", Fingerprint::compute("new")).await.unwrap();

        let all = store.dump().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("k"), Some(&Fingerprint::compute("new")));
    }

    #[tokio::test]
    async fn test_update_is_not_persisted_without_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let store = FileHistoryStore::load(&path).await.unwrap();
        store.update("k", Fingerprint::compute("v")).await.unwrap();
        assert!(!path.exists());

        let reloaded = FileHistoryStore::load(&path).await.unwrap();
        assert_eq!(reloaded.query("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        fs::write(&path, b"corrupted json data").await.unwrap();
        let err = FileHistoryStore::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::StoreCorrupt(_)), "got {:?}", err);

        // The corrupt file is left for the operator
        assert_eq!(fs::read(&path).await.unwrap(), b"corrupted json data");
    }

    #[tokio::test]
    async fn test_empty_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        fs::write(&path, b"").await.unwrap();

        let err = FileHistoryStore::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::StoreCorrupt(_)));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        // A bare mapping without the envelope
        fs::write(&path, br#"{"example.com/TXT": "abc"}"#).await.unwrap();
        assert!(matches!(
            FileHistoryStore::load(&path).await.unwrap_err(),
            Error::StoreCorrupt(_)
        ));

        // Right envelope, value is not a fingerprint
        fs::write(
            &path,
            br#"{"version": "1.0", "records": {"example.com/TXT": "abc"}}"#,
        )
        .await
        .unwrap();
        assert!(matches!(
            FileHistoryStore::load(&path).await.unwrap_err(),
            Error::StoreCorrupt(_)
        ));
    }

    #[tokio::test]
    async fn test_version_mismatch_still_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        let fp = Fingerprint::compute("x");

        let content = serde_json::json!({
            "version": "0.9",
            "records": { "example.com/TXT": fp.as_str() }
        });
        fs::write(&path, content.to_string()).await.unwrap();

        let store = FileHistoryStore::load(&path).await.unwrap();
        assert_eq!(store.query("example.com/TXT").await.unwrap(), Some(fp));
    }

    #[tokio::test]
    async fn test_directory_path_is_unavailable() {
        let dir = tempdir().unwrap();

        let err = FileHistoryStore::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_flush_keeps_backup_of_previous_copy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let store = FileHistoryStore::load(&path).await.unwrap();
        store.update("k", Fingerprint::compute("first")).await.unwrap();
        store.flush().await.unwrap();
        store.update("k", Fingerprint::compute("second")).await.unwrap();
        store.flush().await.unwrap();

        let backup = FileHistoryStore::load(FileHistoryStore::backup_path(&path))
            .await
            .unwrap();
        assert_eq!(
            backup.query("k").await.unwrap(),
            Some(Fingerprint::compute("first"))
        );
        assert!(!FileHistoryStore::temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_flush_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store");

        let store = FileHistoryStore::load(&path).await.unwrap();
        store.update("k", Fingerprint::compute("v")).await.unwrap();
        store.flush().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_failed_flush_leaves_previous_copy_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let store = FileHistoryStore::load(&path).await.unwrap();
        store.update("k", Fingerprint::compute("kept")).await.unwrap();
        store.flush().await.unwrap();

        // A directory squatting on the temp path makes the write fail
        fs::create_dir(FileHistoryStore::temp_path(&path)).await.unwrap();
        store.update("k", Fingerprint::compute("lost")).await.unwrap();
        let err = store.flush().await.unwrap_err();
        assert!(matches!(err, Error::StoreWrite(_)), "got {:?}", err);

        let reloaded = FileHistoryStore::load(&path).await.unwrap();
        assert_eq!(
            reloaded.query("k").await.unwrap(),
            Some(Fingerprint::compute("kept"))
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_write_removes_partial_temp_file() {
        // Writes to /dev/full fail with ENOSPC
        if !Path::new("/dev/full").exists() {
            return;
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let temp_path = FileHistoryStore::temp_path(&path);
        std::os::unix::fs::symlink("/dev/full", &temp_path).unwrap();

        let store = FileHistoryStore::load(&path).await.unwrap();
        store.update("k", Fingerprint::compute("v")).await.unwrap();
        let err = store.flush().await.unwrap_err();
        assert!(matches!(err, Error::StoreWrite(_)), "got {:?}", err);

        assert!(std::fs::symlink_metadata(&temp_path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_sibling_paths_append_suffix() {
        let path = Path::new("/tmp/dns_rr_store");
        assert_eq!(
            FileHistoryStore::temp_path(path),
            PathBuf::from("/tmp/dns_rr_store.tmp")
        );
        assert_eq!(
            FileHistoryStore::backup_path(Path::new("/var/lib/rrwatch/store.json")),
            PathBuf::from("/var/lib/rrwatch/store.json.backup")
        );
    }
}

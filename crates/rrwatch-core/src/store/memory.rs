// # Memory History Store
//
// In-memory implementation of HistoryStore.
//
// Nothing survives the process, so every run is a first observation.
// Useful for tests and for embedding the detector where persistence is
// handled elsewhere. Clones share the same underlying map.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::fingerprint::Fingerprint;
use crate::traits::history_store::HistoryStore;

/// In-memory history store implementation
///
/// # Example
///
/// ```rust
/// use rrwatch_core::{Fingerprint, HistoryStore, MemoryHistoryStore};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let store = MemoryHistoryStore::new();
/// store.update("example.com/TXT", Fingerprint::compute("v")).await.unwrap();
///
/// let handle = store.clone();
/// assert!(handle.query("example.com/TXT").await.unwrap().is_some());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<RwLock<BTreeMap<String, Fingerprint>>>,
    flushes: Arc<AtomicUsize>,
}

impl MemoryHistoryStore {
    /// Create a new empty memory history store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_records<I, K>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, Fingerprint)>,
        K: Into<String>,
    {
        let map = records.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
            flushes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Number of times `flush` was called
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn query(&self, key: &str) -> Result<Option<Fingerprint>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn update(&self, key: &str, fingerprint: Fingerprint) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), fingerprint);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing to persist; counted so callers can assert on flush behavior
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dump(&self) -> Result<BTreeMap<String, Fingerprint>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.clone())
    }
}

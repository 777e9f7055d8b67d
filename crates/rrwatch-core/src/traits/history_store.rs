// # History Store Trait
//
// Defines the interface for the persisted record history.
//
// ## Purpose
//
// The store maps a record key (see `RecordQuery::store_key`) to the
// fingerprint of the most recent answer that was acted upon. Exactly one
// fingerprint is kept per key; no timestamps or older values.
//
// ## Lifecycle
//
// Loaded once when constructed, mutated in memory by `update`, written
// back by an explicit `flush`. There is no long-lived store across
// invocations.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::fingerprint::Fingerprint;

/// Trait for history store implementations
///
/// Construction is the load step: an implementation is either freshly
/// loaded from its backing storage or freshly empty before any method
/// below is called. A missing backing file is not an error.
///
/// # Constraints
///
/// - `update` is in-memory only; nothing is persisted until `flush`
/// - `flush` must not leave a half-written backing file behind
/// - No business logic: whether to update is decided by `ChangeDetector`
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Get the stored fingerprint for a key
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Fingerprint))`: The last recorded fingerprint
    /// - `Ok(None)`: Nothing recorded for this key
    async fn query(&self, key: &str) -> Result<Option<Fingerprint>, crate::Error>;

    /// Insert or overwrite the fingerprint for a key (in memory)
    async fn update(&self, key: &str, fingerprint: Fingerprint) -> Result<(), crate::Error>;

    /// Persist the whole mapping
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Successfully written
    /// - `Err(Error::StoreWrite)`: The previous persisted copy is left intact
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Snapshot of the whole mapping, ordered by key
    async fn dump(&self) -> Result<BTreeMap<String, Fingerprint>, crate::Error>;
}

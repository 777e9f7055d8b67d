//! Change detector
//!
//! The ChangeDetector runs one monitoring cycle:
//! - Resolve the record via Resolver
//! - Fingerprint the raw answer
//! - Compare against the HistoryStore
//! - Alert via Notifier when the fingerprint changed
//! - Persist the new fingerprint once it has been acted upon
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Resolver   │─── raw answer ──────┐
//! └─────────────┘                     │
//!                                     ▼
//!                            ┌────────────────┐
//!                            │ ChangeDetector │
//!                            └────────────────┘
//!                                     │
//!                  ┌──────────────────┴──────────────────┐
//!                  │                                     │
//!                  ▼                                     ▼
//!          ┌──────────────┐                      ┌─────────────┐
//!          │ HistoryStore │                      │  Notifier   │
//!          │ (query/flush)│                      │  (alert)    │
//!          └──────────────┘                      └─────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Resolve; an unavailable resolver skips the cycle untouched
//! 2. No stored fingerprint: record a baseline, flush, no alert
//! 3. Same fingerprint: nothing to do
//! 4. Different fingerprint: alert with the raw answer; only on success
//!    update and flush, so a failed alert is retried next cycle

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::traits::{ChangeAlert, HistoryStore, Notifier, Resolver};
use tracing::{debug, info, warn};

/// Terminal state of one monitoring cycle
///
/// Aborts (store unreadable, corrupt or unwritable) are not outcomes;
/// they surface as `Err` from [`ChangeDetector::run_cycle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First observation of this record; baseline stored, no alert
    BaselineRecorded { fingerprint: Fingerprint },

    /// Answer matches the stored fingerprint
    Unchanged { fingerprint: Fingerprint },

    /// Answer changed, alert delivered, store updated
    ChangedNotified {
        previous: Fingerprint,
        current: Fingerprint,
    },

    /// Answer changed but the alert failed; store left as it was
    ChangedNotifyFailed {
        previous: Fingerprint,
        current: Fingerprint,
        reason: String,
    },

    /// No usable answer this cycle; nothing compared or stored
    ResolutionUnavailable { reason: String },
}

impl CycleOutcome {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::BaselineRecorded { .. } => "baseline recorded",
            CycleOutcome::Unchanged { .. } => "unchanged",
            CycleOutcome::ChangedNotified { .. } => "changed, alert sent",
            CycleOutcome::ChangedNotifyFailed { .. } => "changed, alert failed",
            CycleOutcome::ResolutionUnavailable { .. } => "resolution unavailable",
        }
    }
}

/// Change detector for a single record
///
/// ## Lifecycle
///
/// 1. Load the store (e.g. [`FileHistoryStore::load`](crate::store::FileHistoryStore::load))
/// 2. Create with [`ChangeDetector::new()`]
/// 3. Call [`ChangeDetector::run_cycle()`] once
/// 4. Exit with a code derived from the outcome
pub struct ChangeDetector {
    /// Resolver for the current answer
    resolver: Box<dyn Resolver>,

    /// Notifier for change alerts
    notifier: Box<dyn Notifier>,

    /// History of fingerprints
    store: Box<dyn HistoryStore>,

    /// Record and alert settings
    config: MonitorConfig,
}

impl ChangeDetector {
    /// Create a new change detector
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)` if the configuration does not validate
    pub fn new(
        resolver: Box<dyn Resolver>,
        notifier: Box<dyn Notifier>,
        store: Box<dyn HistoryStore>,
        config: MonitorConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            resolver,
            notifier,
            store,
            config,
        })
    }

    /// Run one monitoring cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleOutcome)`: The cycle reached a terminal state
    /// - `Err(Error::StoreWrite)`: The decision was made but could not be persisted
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let record = &self.config.record;
        let key = record.store_key();

        debug!(
            "Looking up {} via {}",
            record,
            self.resolver.resolver_name()
        );

        let raw = match self.resolver.resolve(record).await {
            Ok(raw) => raw,
            Err(Error::ResolutionUnavailable(reason)) => {
                warn!("Resolution of {} unavailable, skipping cycle: {}", record, reason);
                return Ok(CycleOutcome::ResolutionUnavailable { reason });
            }
            Err(e) => return Err(e),
        };

        let current = Fingerprint::compute(&raw);
        let stored = self.store.query(&key).await?;

        debug!("Stored fingerprint for {}: {:?}", key, stored.as_ref().map(|f| f.as_str()));
        debug!("Live fingerprint for {}: {}", key, current);

        let previous = match stored {
            None => {
                info!("No stored fingerprint for {}, recording baseline", key);
                self.store.update(&key, current.clone()).await?;
                self.store.flush().await?;
                return Ok(CycleOutcome::BaselineRecorded {
                    fingerprint: current,
                });
            }
            Some(previous) if previous == current => {
                debug!("No change in {}", key);
                return Ok(CycleOutcome::Unchanged {
                    fingerprint: current,
                });
            }
            Some(previous) => previous,
        };

        info!("{} changed: {} -> {}", key, previous, current);

        // The alert carries the same answer that was fingerprinted
        let alert = ChangeAlert::new(&self.config.alert, record, raw);

        match self.notifier.notify(&alert).await {
            Ok(()) => {
                info!(
                    "Alert for {} delivered to {} via {}",
                    key,
                    alert.to,
                    self.notifier.notifier_name()
                );
                self.store.update(&key, current.clone()).await?;
                self.store.flush().await?;
                Ok(CycleOutcome::ChangedNotified { previous, current })
            }
            Err(e) => {
                warn!(
                    "Alert for {} failed, keeping stored fingerprint so the change is re-detected: {}",
                    key, e
                );
                Ok(CycleOutcome::ChangedNotifyFailed {
                    previous,
                    current,
                    reason: e.to_string(),
                })
            }
        }
    }
}

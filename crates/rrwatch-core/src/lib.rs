// # rrwatch-core
//
// Core library for the rrwatch DNS record change monitor.
//
// ## Architecture Overview
//
// One invocation runs one monitoring cycle for one resource record:
// - **Resolver**: Trait for looking up the current text of a record
// - **Notifier**: Trait for delivering a change alert
// - **HistoryStore**: Trait for the persisted record -> fingerprint mapping
// - **ChangeDetector**: Orchestrates resolve -> fingerprint -> compare -> notify -> persist
//
// Subprocess and socket code lives in the plugin crates
// (`rrwatch-resolver-dig`, `rrwatch-notify-smtp`); this crate only owns
// the state and the decisions.

pub mod traits;
pub mod detector;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod store;

// Re-export core types for convenience
pub use traits::{ChangeAlert, HistoryStore, Notifier, Resolver};
pub use detector::{ChangeDetector, CycleOutcome};
pub use config::{AlertConfig, MonitorConfig, RecordQuery, ResolverConfig, SmtpConfig};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use store::{FileHistoryStore, MemoryHistoryStore};

//! Core traits for rrwatch
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Resolver`]: Look up the current text of a record
//! - [`Notifier`]: Deliver a change alert
//! - [`HistoryStore`]: Persisted record -> fingerprint mapping

pub mod resolver;
pub mod notifier;
pub mod history_store;

pub use resolver::Resolver;
pub use notifier::{ChangeAlert, Notifier};
pub use history_store::HistoryStore;

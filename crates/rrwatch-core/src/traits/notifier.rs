// # Notifier Trait
//
// Defines the interface for delivering change alerts.
//
// ## Implementations
//
// - SMTP relay: `rrwatch-notify-smtp` crate

use async_trait::async_trait;

use crate::config::{AlertConfig, RecordQuery};

/// A change alert ready to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeAlert {
    /// Sender address
    pub from: String,
    /// Destination address
    pub to: String,
    /// The record that changed
    pub record: RecordQuery,
    /// The new raw (unhashed) answer
    pub raw_value: String,
}

impl ChangeAlert {
    pub fn new(alert: &AlertConfig, record: &RecordQuery, raw_value: impl Into<String>) -> Self {
        Self {
            from: alert.from.clone(),
            to: alert.to.clone(),
            record: record.clone(),
            raw_value: raw_value.into(),
        }
    }

    /// Subject line for the alert
    pub fn subject(&self) -> String {
        format!("DNS-RR-Monitor Alert: {} changed.", self.record)
    }

    /// Plain-text body for the alert
    pub fn body(&self) -> String {
        let value = self.raw_value.trim_end_matches(['\r', '\n']);
        let value = if value.is_empty() {
            "(empty answer)"
        } else {
            value
        };
        format!(
            "The RR {} changed content, new:\n\n{}\n",
            self.record, value
        )
    }
}

/// Trait for notifier implementations
///
/// # Failure semantics
///
/// Delivery failures (connection refused, protocol rejection, timeout)
/// are returned as [`Error::Notify`](crate::Error::Notify), never panics.
/// The detector only persists the new fingerprint after `Ok(())`, so a
/// failed alert is retried on the next cycle.
///
/// # Constraints
///
/// - Single delivery attempt per call
/// - Must enforce its own deadline
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert
    async fn notify(&self, alert: &ChangeAlert) -> Result<(), crate::Error>;

    /// Notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

// # Resolver Trait
//
// Defines the interface for looking up the current content of a record.
//
// ## Implementations
//
// - dig subprocess: `rrwatch-resolver-dig` crate
//
// ## Usage
//
// ```rust,ignore
// use rrwatch_core::{RecordQuery, Resolver};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* Resolver implementation */;
//
//     let raw = resolver.resolve(&RecordQuery::new("example.com", "TXT")).await?;
//     println!("{}", raw);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::config::RecordQuery;

/// Trait for resolver implementations
///
/// A resolver turns a (name, query type) pair into the record's text
/// representation, one value per line. The text is treated as opaque:
/// the detector fingerprints the exact bytes returned.
///
/// # Failure semantics
///
/// An answer with no records is `Ok(String::new())`, a real observation.
/// Anything that prevents an answer from being read (spawn failure,
/// non-zero exit, deadline) must be reported as
/// [`Error::ResolutionUnavailable`](crate::Error::ResolutionUnavailable)
/// so the detector can skip the cycle instead of treating an outage as
/// "the record became empty".
///
/// # Constraints
///
/// - Single attempt per call: no retry or backoff here
/// - Must enforce its own deadline; the detector does not time out calls
/// - No access to the history store
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a record
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: Raw answer text (possibly empty, possibly multi-line)
    /// - `Err(Error::ResolutionUnavailable)`: No usable answer this cycle
    async fn resolve(&self, query: &RecordQuery) -> Result<String, crate::Error>;

    /// Resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}

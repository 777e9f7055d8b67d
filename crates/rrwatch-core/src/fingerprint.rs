//! Fingerprints of resolved record text
//!
//! A fingerprint is the lowercase hex SHA-256 digest of the exact bytes a
//! resolver returned, trailing newline included. Only fingerprints are
//! persisted; two answers are "unchanged" iff their fingerprints are equal.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Error, Result};

/// Length of a rendered fingerprint (SHA-256, hex encoded)
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 digest of a raw resolver answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a raw answer
    pub fn compute(raw: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(raw.as_ref());
        Self(hex::encode(digest))
    }

    /// Parse a previously rendered fingerprint
    ///
    /// Only exactly 64 lowercase hex characters are accepted, so a digest
    /// from any other algorithm (or a hand-edited store) is rejected instead
    /// of being compared against SHA-256 output.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != FINGERPRINT_HEX_LEN {
            return Err(Error::invalid_input(format!(
                "fingerprint must be {} hex characters, got {}",
                FINGERPRINT_HEX_LEN,
                s.len()
            )));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(Error::invalid_input(format!(
                "fingerprint contains non lowercase-hex characters: {}",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

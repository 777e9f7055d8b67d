//! Configuration types for rrwatch
//!
//! This module defines all configuration structures used throughout the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default store location
pub const DEFAULT_STORE_PATH: &str = "/tmp/dns_rr_store";

/// The resource record being watched: a DNS name plus a query type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// DNS name (e.g., "example.com" or "_dmarc.example.com")
    pub name: String,

    /// Query type (e.g., "TXT", "A", "MX")
    #[serde(default = "default_query_type")]
    pub query_type: String,
}

impl RecordQuery {
    /// Create a new record query, normalizing the query type to uppercase
    pub fn new(name: impl Into<String>, query_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query_type: query_type.into().to_ascii_uppercase(),
        }
    }

    /// Key under which this record's fingerprint is stored
    ///
    /// The key covers both name and type so that watching one name with
    /// two query types keeps two independent entries.
    pub fn store_key(&self) -> String {
        let name = self.name.trim_end_matches('.').to_ascii_lowercase();
        format!("{}/{}", name, self.query_type.to_ascii_uppercase())
    }

    /// Validate the record name and query type
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.name)?;

        let qt = &self.query_type;
        if qt.is_empty() || qt.len() > 10 || !qt.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(crate::Error::config(format!(
                "Query type '{}' is not valid. Expected e.g. TXT, A, AAAA, MX",
                qt
            )));
        }

        Ok(())
    }
}

impl fmt::Display for RecordQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.query_type)
    }
}

/// Addresses used for change alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Envelope and header sender; may be a bare local part
    pub from: String,

    /// Destination mailbox
    pub to: String,
}

impl AlertConfig {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Validate both addresses
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_address("from", &self.from)?;
        validate_address("destination", &self.to)?;
        if !self.to.contains('@') {
            return Err(crate::Error::config(format!(
                "Destination address '{}' must contain '@'",
                self.to
            )));
        }
        Ok(())
    }
}

/// Everything one monitoring cycle needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Record to watch
    pub record: RecordQuery,

    /// Path of the history store file
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Alert addressing
    pub alert: AlertConfig,
}

impl MonitorConfig {
    pub fn new(record: RecordQuery, alert: AlertConfig) -> Self {
        Self {
            record,
            store_path: default_store_path(),
            alert,
        }
    }

    /// Set the store path
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.store_path.as_os_str().is_empty() {
            return Err(crate::Error::config("Store path cannot be empty"));
        }
        self.record.validate()?;
        self.alert.validate()?;
        Ok(())
    }
}

/// Resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Lookup program to run
    #[serde(default = "default_resolver_program")]
    pub program: String,

    /// Nameserver to query instead of the system default
    #[serde(default)]
    pub nameserver: Option<String>,

    /// Deadline for one lookup (in seconds)
    #[serde(default = "default_resolve_timeout_secs")]
    pub timeout_secs: u64,
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.program.trim().is_empty() {
            return Err(crate::Error::config("Resolver program cannot be empty"));
        }
        if let Some(ns) = &self.nameserver
            && (ns.is_empty() || ns.chars().any(char::is_whitespace))
        {
            return Err(crate::Error::config(format!(
                "Nameserver '{}' is not valid",
                ns
            )));
        }
        validate_timeout("Resolver", self.timeout_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: default_resolver_program(),
            nameserver: None,
            timeout_secs: default_resolve_timeout_secs(),
        }
    }
}

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host name or address
    #[serde(default = "default_relay")]
    pub relay: String,

    /// Relay port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Name announced in EHLO/HELO
    #[serde(default = "default_helo_name")]
    pub helo_name: String,

    /// Deadline for the whole SMTP dialogue (in seconds)
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

impl SmtpConfig {
    /// Validate the SMTP configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.relay.trim().is_empty() {
            return Err(crate::Error::config("Mail relay host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("Mail relay port must be > 0"));
        }
        if self.helo_name.is_empty()
            || self
                .helo_name
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(crate::Error::config(format!(
                "HELO name '{}' is not valid",
                self.helo_name
            )));
        }
        validate_timeout("SMTP", self.timeout_secs)
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            relay: default_relay(),
            port: default_smtp_port(),
            helo_name: default_helo_name(),
            timeout_secs: default_smtp_timeout_secs(),
        }
    }
}

/// Validate that a string is a usable DNS name
///
/// Basic RFC 1035 checks, relaxed to allow underscores since TXT records
/// commonly live under names like `_dmarc` or `_domainkey`.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    if domain.is_empty() {
        return Err(crate::Error::config("Record name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Record name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Record name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Record label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::config(format!(
                "Record label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Record label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn validate_address(role: &str, addr: &str) -> Result<(), crate::Error> {
    if addr.is_empty() {
        return Err(crate::Error::config(format!(
            "The {} address cannot be empty",
            role
        )));
    }
    // Addresses end up verbatim in SMTP commands and headers
    if addr
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
    {
        return Err(crate::Error::config(format!(
            "The {} address '{}' contains forbidden characters",
            role,
            addr.escape_debug()
        )));
    }
    Ok(())
}

fn validate_timeout(what: &str, secs: u64) -> Result<(), crate::Error> {
    if !(1..=300).contains(&secs) {
        return Err(crate::Error::config(format!(
            "{} timeout must be between 1 and 300 seconds. Got: {}",
            what, secs
        )));
    }
    Ok(())
}

fn default_query_type() -> String {
    "TXT".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_resolver_program() -> String {
    "dig".to_string()
}

fn default_resolve_timeout_secs() -> u64 {
    10
}

fn default_relay() -> String {
    "mail".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_helo_name() -> String {
    "localhost".to_string()
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

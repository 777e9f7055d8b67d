// # dig Resolver
//
// This crate provides a Resolver backed by the `dig` command line tool.
//
// ## Invocation
//
// `dig [@nameserver] +noall +comments +answer +nomultiline +ttlid +cl <name> <TYPE>`
//
// The comment section carries the response header, so the rcode is
// visible: `dig +short` prints nothing and exits 0 both for a record that
// has no data and for a server that answered SERVFAIL. The rdata of
// every answer line is returned one value per line, the same text
// `dig +short` would print.
//
// ## Failure Mapping
//
// - Program missing / not executable: unavailable
// - Non-zero exit status (dig uses 9 for "no reply from server"): unavailable
// - Deadline expired: child killed, unavailable
// - No response header in the output: unavailable
// - Status other than NOERROR / NXDOMAIN (SERVFAIL, REFUSED, ...): unavailable
// - Output that is not UTF-8: unavailable
// - NOERROR without answers (NODATA) or NXDOMAIN: a real, empty answer

use rrwatch_core::config::{RecordQuery, ResolverConfig};
use rrwatch_core::traits::Resolver;
use rrwatch_core::{Error, Result};

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Response codes that describe the record itself rather than an outage
const AUTHORITATIVE_STATUSES: &[&str] = &["NOERROR", "NXDOMAIN"];

/// Marker dig puts in front of the response header line
const HEADER_MARKER: &str = "->>HEADER<<-";

/// Resolver that shells out to `dig`
#[derive(Debug, Clone)]
pub struct DigResolver {
    /// Program to run (normally "dig")
    program: String,

    /// Nameserver passed as `@server`
    nameserver: Option<String>,

    /// Deadline for one lookup
    timeout: Duration,
}

impl DigResolver {
    /// Create a new dig resolver
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            program: config.program.clone(),
            nameserver: config.nameserver.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Arguments passed to the program for a query
    ///
    /// Output options are spelled out so a `~/.digrc` cannot change the
    /// layout being parsed.
    fn args(&self, query: &RecordQuery) -> Vec<String> {
        let mut args = Vec::with_capacity(9);
        if let Some(ns) = &self.nameserver {
            args.push(format!("@{}", ns));
        }
        for opt in ["+noall", "+comments", "+answer", "+nomultiline", "+ttlid", "+cl"] {
            args.push(opt.to_string());
        }
        args.push(query.name.clone());
        args.push(query.query_type.to_ascii_uppercase());
        args
    }
}

#[async_trait::async_trait]
impl Resolver for DigResolver {
    async fn resolve(&self, query: &RecordQuery) -> Result<String> {
        let args = self.args(query);
        tracing::debug!(
            "Looking up {} with cmd: {} {}",
            query,
            self.program,
            args.join(" ")
        );

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::resolution(format!(
                    "failed to run {}: {}",
                    self.program, e
                )));
            }
            Err(_) => {
                return Err(Error::resolution(format!(
                    "{} did not finish within {:?}",
                    self.program, self.timeout
                )));
            }
        };

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = [stdout.trim(), stderr.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::resolution(format!(
                "{} exited with {}: {}",
                self.program, output.status, detail
            )));
        }

        // dig escapes non-printable rdata bytes as \DDD, so its output is
        // plain text. Anything else is refused rather than lossily decoded,
        // which keeps the returned text byte-identical to what dig printed.
        let stdout = String::from_utf8(output.stdout).map_err(|e| {
            Error::resolution(format!("{} printed non-UTF-8 output: {}", self.program, e))
        })?;

        let reply = parse_reply(&stdout);
        for line in &reply.diagnostics {
            tracing::warn!("{} reported: {}", self.program, line);
        }

        match reply.status.as_deref() {
            None => Err(Error::resolution(format!(
                "{} printed no response header for {}",
                self.program, query
            ))),
            Some(status) if !AUTHORITATIVE_STATUSES.contains(&status) => Err(
                Error::resolution(format!("server answered {} for {}", status, query)),
            ),
            Some(status) => {
                let answer = reply.answer();
                tracing::debug!(
                    "Lookup of {} returned {} with {} record(s)",
                    query,
                    status,
                    reply.records.len()
                );
                Ok(answer)
            }
        }
    }

    fn resolver_name(&self) -> &'static str {
        "dig"
    }
}

/// What dig printed for one query
#[derive(Debug, Default, PartialEq, Eq)]
struct DigReply {
    /// Status from the last response header, e.g. "NOERROR"
    status: Option<String>,

    /// Rdata of each answer line, in order
    records: Vec<String>,

    /// Comment lines reporting errors or warnings
    diagnostics: Vec<String>,
}

impl DigReply {
    /// Answer text in `dig +short` layout: one rdata per line
    fn answer(&self) -> String {
        let mut answer = String::new();
        for record in &self.records {
            answer.push_str(record);
            answer.push('\n');
        }
        answer
    }
}

/// Parse `+noall +comments +answer` output
///
/// Lines starting with `;` are comments. The response header line looks
/// like `;; ->>HEADER<<- opcode: QUERY, status: SERVFAIL, id: 4711`; dig
/// prints one per response it received and the last one counts.
fn parse_reply(stdout: &str) -> DigReply {
    let mut reply = DigReply::default();

    for line in stdout.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(';') {
            if line.contains(HEADER_MARKER) {
                reply.status = header_status(line).map(str::to_string);
            } else if is_diagnostic(line) {
                reply.diagnostics.push(line.to_string());
            }
            continue;
        }

        if let Some(rdata) = rdata(line) {
            reply.records.push(rdata.to_string());
        }
    }

    reply
}

/// Extract the rcode from a response header line
fn header_status(line: &str) -> Option<&str> {
    let rest = &line[line.find("status:")? + "status:".len()..];
    let status = rest.split(',').next()?.trim();
    (!status.is_empty()).then_some(status)
}

/// Rdata of an answer line: everything after name, TTL, class and type
fn rdata(line: &str) -> Option<&str> {
    let mut rest = line;
    for _ in 0..4 {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }
    let rdata = rest.trim();
    (!rdata.is_empty()).then_some(rdata)
}

/// Comment lines worth surfacing (transient errors, warnings)
fn is_diagnostic(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    ["error", "timed out", "warning", "no servers"]
        .iter()
        .any(|needle| lower.contains(needle))
}

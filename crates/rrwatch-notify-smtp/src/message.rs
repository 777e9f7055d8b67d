//! Alert message rendering
//!
//! Produces an RFC 5322 message with CRLF line endings, already
//! dot-stuffed for the SMTP DATA phase.

use chrono::{DateTime, Utc};
use rrwatch_core::ChangeAlert;

/// Render an alert as the payload of an SMTP DATA command
///
/// The returned text ends with CRLF; the caller appends the `.` terminator.
pub fn render(alert: &ChangeAlert, date: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(256 + alert.raw_value.len());

    push_header(&mut out, "Date", &date.to_rfc2822());
    push_header(&mut out, "From", &alert.from);
    push_header(&mut out, "To", &alert.to);
    push_header(&mut out, "Subject", &alert.subject());
    push_header(&mut out, "MIME-Version", "1.0");
    push_header(&mut out, "Content-Type", "text/plain; charset=utf-8");
    push_header(&mut out, "Content-Transfer-Encoding", "8bit");
    out.push_str("\r\n");

    for line in alert.body().lines() {
        // Transparency (RFC 5321 4.5.2)
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }

    out
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

//! Structured JSON logger.
//!
//! One log line is one event: a JSON object with a timestamp, severity,
//! event name, and sorted context fields. Lines are written synchronously
//! with a single write call, so concurrent servers never interleave within
//! a line. Background servers use this as their only failure channel —
//! their loops run detached and have no return path to the caller.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::Utc;

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-cycle detail from the background servers.
    Trace = 0,
    /// Normal operations.
    Info = 1,
    /// Recoverable issues.
    Warn = 2,
    /// A server loop failed and stopped.
    Error = 3,
}

impl Severity {
    /// String form used in the JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    fn from_raw(raw: u8) -> Severity {
        match raw {
            0 => Severity::Trace,
            1 => Severity::Info,
            2 => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimum severity that is emitted. TRACE is off by default; the archive
/// and preallocation cycles log there every pass.
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// Synchronous structured logger.
pub struct Logger;

impl Logger {
    /// Set the minimum severity that will be emitted.
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    /// Current minimum severity.
    pub fn min_severity() -> Severity {
        Severity::from_raw(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Emit one event. `fields` are (key, value) context pairs.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < Self::min_severity() {
            return;
        }
        if severity >= Severity::Error {
            Self::write_line(severity, event, fields, &mut io::stderr());
        } else {
            Self::write_line(severity, event, fields, &mut io::stdout());
        }
    }

    /// Emit at TRACE.
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Emit at INFO.
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Emit at WARN.
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Emit at ERROR.
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    fn write_line<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut line = String::with_capacity(256);

        line.push_str("{\"ts\":\"");
        line.push_str(&Utc::now().to_rfc3339());
        line.push_str("\",\"severity\":\"");
        line.push_str(severity.as_str());
        line.push_str("\",\"event\":\"");
        escape_into(&mut line, event);
        line.push('"');

        // Sorted keys keep the output deterministic for a given event.
        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted {
            line.push_str(",\"");
            escape_into(&mut line, key);
            line.push_str("\":\"");
            escape_into(&mut line, value);
            line.push('"');
        }

        line.push_str("}\n");

        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
fn capture(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::write_line(severity, event, fields, &mut buffer);
    String::from_utf8(buffer).unwrap()
}

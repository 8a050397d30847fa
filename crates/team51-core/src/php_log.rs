//! PHP error log parsing.
//!
//! Pressable writes PHP errors to `/tmp/php-errors` in the standard PHP
//! format:
//!
//! ```text
//! [18-Oct-2026 10:02:03 UTC] PHP Fatal error:  Uncaught Error: ... in /srv/htdocs/x.php:12
//! [18-Oct-2026 10:02:03 UTC] PHP Stack trace:
//! [18-Oct-2026 10:02:03 UTC] PHP   1. {main}() /srv/htdocs/index.php:0
//! ```
//!
//! Entries are deduplicated by severity and message, counted, and sorted so
//! the most severe and most frequent problems come first.

use chrono::NaiveDateTime;
use derive_more::Display;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::{Error, Result};

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[(?P<ts>\d{1,2}-[A-Za-z]{3}-\d{4} \d{2}:\d{2}:\d{2})(?: [^\]]+)?\] (?:PHP )?(?P<sev>[A-Za-z][A-Za-z ]*?):\s+(?P<msg>.*)$",
    )
    .expect("invalid entry regex")
});

static TRACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[^\]]+\] PHP (?:Stack trace:|\s+\d+\.)").expect("invalid trace regex")
});

const TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// Severity of a PHP log entry, ordered from most to least severe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display)]
pub enum Severity {
    #[display("Fatal error")]
    Fatal,
    #[display("Parse error")]
    Parse,
    #[display("Warning")]
    Warning,
    #[display("Notice")]
    Notice,
    #[display("Deprecated")]
    Deprecated,
    #[display("{_0}")]
    Other(String),
}

impl Severity {
    fn from_label(label: &str) -> Self {
        match label.trim() {
            "Fatal error" => Severity::Fatal,
            "Parse error" => Severity::Parse,
            "Warning" => Severity::Warning,
            "Notice" => Severity::Notice,
            "Deprecated" => Severity::Deprecated,
            other => Severity::Other(other.to_string()),
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Severity::Fatal => 0,
            Severity::Parse => 1,
            Severity::Warning => 2,
            Severity::Notice => 3,
            Severity::Deprecated => 4,
            Severity::Other(_) => 5,
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = Error;

    /// Parse a `--severity` flag value.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fatal" => Ok(Severity::Fatal),
            "parse" => Ok(Severity::Parse),
            "warning" => Ok(Severity::Warning),
            "notice" => Ok(Severity::Notice),
            "deprecated" => Ok(Severity::Deprecated),
            other => Err(Error::InvalidInput(format!("unknown severity: {}", other))),
        }
    }
}

/// A single log entry with any continuation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub severity: Severity,
    pub message: String,
    pub trace: Vec<String>,
}

/// A deduplicated log message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub severity: Severity,
    pub message: String,
    pub count: usize,
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
}

/// Parse raw log text into entries.
pub fn parse(log: &str) -> Vec<LogEntry> {
    let mut entries: Vec<LogEntry> = Vec::new();

    for line in log.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with('[') || TRACE_RE.is_match(line) {
            // Continuation lines before the first entry have nothing to attach to.
            if let Some(last) = entries.last_mut() {
                last.trace.push(line.trim_end().to_string());
            }
            continue;
        }

        let Some(caps) = ENTRY_RE.captures(line) else {
            continue;
        };
        let Ok(timestamp) = NaiveDateTime::parse_from_str(&caps["ts"], TIMESTAMP_FORMAT) else {
            continue;
        };

        entries.push(LogEntry {
            timestamp,
            severity: Severity::from_label(&caps["sev"]),
            message: caps["msg"].trim().to_string(),
            trace: Vec::new(),
        });
    }

    entries
}

/// Deduplicate and sort entries.
pub fn summarize(entries: &[LogEntry]) -> Vec<LogSummary> {
    let mut by_key: HashMap<(Severity, &str), LogSummary> = HashMap::new();

    for entry in entries {
        by_key
            .entry((entry.severity.clone(), entry.message.as_str()))
            .and_modify(|s| {
                s.count += 1;
                s.first_seen = s.first_seen.min(entry.timestamp);
                s.last_seen = s.last_seen.max(entry.timestamp);
            })
            .or_insert_with(|| LogSummary {
                severity: entry.severity.clone(),
                message: entry.message.clone(),
                count: 1,
                first_seen: entry.timestamp,
                last_seen: entry.timestamp,
            });
    }

    let mut summaries: Vec<LogSummary> = by_key.into_values().collect();
    summaries.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.message.cmp(&b.message))
    });
    summaries
}

/// Keep summaries at least as severe as `min`, up to `limit` of them.
pub fn filter(summaries: Vec<LogSummary>, min: Option<&Severity>, limit: Option<usize>) -> Vec<LogSummary> {
    summaries
        .into_iter()
        .filter(|s| min.is_none_or(|m| s.severity.rank() <= m.rank()))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

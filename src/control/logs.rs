//! Bounded request and security logs.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Most request log entries a single query returns.
pub const LOG_QUERY_LIMIT: usize = 100;
/// Most security events a single query returns.
pub const SECURITY_QUERY_LIMIT: usize = 50;

/// Current time as RFC 3339 with millisecond precision, e.g. `2026-01-02T03:04:05.678Z`.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One inbound request as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestLogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub ip: String,
    pub path: String,
    pub method: String,
}

impl RequestLogEntry {
    /// Builds an `info` entry stamped now with message `"<METHOD> <path> - <ip>"`.
    #[must_use]
    pub fn new(method: &str, path: &str, ip: &str) -> Self {
        Self {
            timestamp: timestamp_now(),
            level: LogLevel::Info,
            message: format!("{method} {path} - {ip}"),
            ip: ip.to_string(),
            path: path.to_string(),
            method: method.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityEvent {
    pub timestamp: String,
    pub message: String,
    pub severity: Severity,
}

impl SecurityEvent {
    #[must_use]
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            timestamp: timestamp_now(),
            message: message.into(),
            severity,
        }
    }
}

/// Filter for request log queries.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Exact level name. `None`, empty or `all` matches every level.
    pub level: Option<String>,
    /// Case-insensitive substring of the message.
    pub search: Option<String>,
}

impl LogQuery {
    fn matches(&self, entry: &RequestLogEntry) -> bool {
        if let Some(ref level) = self.level
            && !level.is_empty()
            && level != "all"
            && entry.level.as_str() != level
        {
            return false;
        }
        if let Some(ref q) = self.search
            && !q.is_empty()
            && !entry.message.to_lowercase().contains(&q.to_lowercase())
        {
            return false;
        }
        true
    }
}

/// Fixed-capacity FIFO ring. Pushing into a full ring evicts the oldest entry.
#[derive(Debug)]
pub struct LogRing<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> LogRing<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Up to `limit` entries accepted by `keep`, newest first.
    pub fn newest<F>(&self, limit: usize, keep: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.buf
            .iter()
            .rev()
            .filter(|e| keep(e))
            .take(limit)
            .cloned()
            .collect()
    }
}

impl LogRing<RequestLogEntry> {
    /// Filtered request entries, newest first, capped at [`LOG_QUERY_LIMIT`].
    #[must_use]
    pub fn query(&self, query: &LogQuery) -> Vec<RequestLogEntry> {
        self.newest(LOG_QUERY_LIMIT, |e| query.matches(e))
    }
}

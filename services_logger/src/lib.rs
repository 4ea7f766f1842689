//! # Logger Service
//!
//! This crate implements structured kernel diagnostics.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! The kernel hands every entry to a [`LogSink`]; what happens next (kept
//! in memory, printed, dropped) is the sink's business. Diagnostics never
//! feed back into control flow.

use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Clock tick at which the entry was recorded (if known)
    pub tick: Option<u64>,
    /// Source process (if known)
    pub source: Option<Pid>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            tick: None,
            source: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Sets the source process
    pub fn with_source(mut self, source: Pid) -> Self {
        self.source = Some(source);
        self
    }

    /// Stamps the entry with a clock tick
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Looks up a field value by key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.level)?;
        if let Some(tick) = self.tick {
            write!(f, " t={}", tick)?;
        }
        if let Some(pid) = self.source {
            write!(f, " {}", pid)?;
        }
        write!(f, ": {}", self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Destination for log entries
pub trait LogSink {
    /// Records one entry
    fn record(&mut self, entry: LogEntry);
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn record(&mut self, entry: LogEntry) {
        (**self).record(entry)
    }
}

/// Retains entries in memory
///
/// Entries below `min_level` are dropped on arrival. The retained error
/// entries are the error dump a shell displays.
#[derive(Debug, Clone)]
pub struct MemoryLog {
    entries: Vec<LogEntry>,
    min_level: LogLevel,
}

impl MemoryLog {
    /// Creates a log that keeps everything
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            min_level: LogLevel::Debug,
        }
    }

    /// Drops entries below `level`
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// All retained entries, oldest first
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Retained entries at `Error` level
    pub fn errors(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.level == LogLevel::Error)
    }

    /// Removes every retained entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemoryLog {
    fn record(&mut self, entry: LogEntry) {
        if entry.level >= self.min_level {
            self.entries.push(entry);
        }
    }
}

/// Discards every entry
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl LogSink for NullLog {
    fn record(&mut self, _entry: LogEntry) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_entry_creation() {
        let entry = LogEntry::new(LogLevel::Info, "test message");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "test message");
        assert!(entry.source.is_none());
        assert!(entry.tick.is_none());
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn test_log_entry_with_source() {
        let entry = LogEntry::new(LogLevel::Info, "test").with_source(Pid::new(4));
        assert_eq!(entry.source, Some(Pid::new(4)));
    }

    #[test]
    fn test_log_entry_with_fields() {
        let entry = LogEntry::new(LogLevel::Info, "test")
            .with_field("vpn", 2)
            .with_field("frame", 7);

        assert_eq!(entry.fields.len(), 2);
        assert_eq!(entry.field("vpn"), Some("2"));
        assert_eq!(entry.field("frame"), Some("7"));
        assert_eq!(entry.field("missing"), None);
    }

    #[test]
    fn test_log_entry_display() {
        let entry = LogEntry::new(LogLevel::Error, "page fault")
            .with_tick(12)
            .with_source(Pid::new(3))
            .with_field("vpn", 1);
        assert_eq!(entry.to_string(), "[ERROR] t=12 P3: page fault vpn=1");
    }

    #[test]
    fn test_memory_log_filters_and_collects_errors() {
        let mut log = MemoryLog::new().with_min_level(LogLevel::Info);
        log.record(LogEntry::new(LogLevel::Debug, "dropped"));
        log.record(LogEntry::new(LogLevel::Info, "kept"));
        log.record(LogEntry::new(LogLevel::Error, "bad"));

        assert_eq!(log.entries().len(), 2);
        let errors: Vec<_> = log.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "bad");

        log.clear();
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let mut sink: Box<dyn LogSink> = Box::new(NullLog);
        sink.record(LogEntry::new(LogLevel::Warn, "ignored"));

        let mut boxed: Box<MemoryLog> = Box::new(MemoryLog::new());
        boxed.record(LogEntry::new(LogLevel::Warn, "kept"));
        assert_eq!(boxed.entries().len(), 1);
    }

    #[test]
    fn test_log_entry_serializes() {
        let entry = LogEntry::new(LogLevel::Warn, "deadlock").with_source(Pid::new(1));
        let json = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}

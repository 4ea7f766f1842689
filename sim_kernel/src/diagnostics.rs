//! Kernel-side log plumbing

use services_logger::{LogEntry, LogLevel, LogSink, MemoryLog};

/// Retains every entry and optionally forwards a copy to another sink
///
/// The retained log backs the error dump; the mirror lets a shell print
/// entries as they happen.
#[derive(Default)]
pub struct Diagnostics {
    retained: MemoryLog,
    mirror: Option<Box<dyn LogSink>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.retained = self.retained.with_min_level(level);
        self
    }

    pub fn set_mirror(&mut self, sink: Box<dyn LogSink>) {
        self.mirror = Some(sink);
    }

    pub fn retained(&self) -> &MemoryLog {
        &self.retained
    }

    pub fn clear(&mut self) {
        self.retained.clear();
    }
}

impl LogSink for Diagnostics {
    fn record(&mut self, entry: LogEntry) {
        if let Some(mirror) = self.mirror.as_mut() {
            mirror.record(entry.clone());
        }
        self.retained.record(entry);
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("retained", &self.retained.entries().len())
            .field("mirrored", &self.mirror.is_some())
            .finish()
    }
}

//! Bounded log of pull diagnostics.
//!
//! Backed by a fixed-capacity `HeapRb`; once full, the oldest diagnostic is
//! overwritten and counted as dropped.

use std::fmt;

use contracts::{Diagnostic, DiagnosticLevel};
use ringbuf::{traits::*, HeapRb};

pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 256;

pub struct EventLog {
    ring: HeapRb<Diagnostic>,
    capacity: usize,
    warnings: u64,
    errors: u64,
    dropped: u64,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("warnings", &self.warnings)
            .field("errors", &self.errors)
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            warnings: 0,
            errors: 0,
            dropped: 0,
        }
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            DiagnosticLevel::Warning => self.warnings += 1,
            DiagnosticLevel::Error => self.errors += 1,
            DiagnosticLevel::Info => {}
        }

        if self.ring.is_full() {
            let _ = self.ring.try_pop();
            self.dropped += 1;
        }
        let _ = self.ring.try_push(diagnostic);
    }

    /// Retained diagnostics, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.ring.iter()
    }

    /// Remove and return every retained diagnostic
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        self.ring.pop_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Warnings recorded since creation, including dropped ones
    pub fn warning_count(&self) -> u64 {
        self.warnings
    }

    /// Errors recorded since creation, including dropped ones
    pub fn error_count(&self) -> u64 {
        self.errors
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ExtrapolationReason, TimeSet};

    fn diagnostic(level: DiagnosticLevel, message: &str) -> Diagnostic {
        Diagnostic::new(
            level,
            "p".into(),
            ExtrapolationReason::Busy,
            TimeSet::single(1.0),
            message,
        )
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut log = EventLog::new(2);
        log.record(diagnostic(DiagnosticLevel::Warning, "a"));
        log.record(diagnostic(DiagnosticLevel::Warning, "b"));
        log.record(diagnostic(DiagnosticLevel::Error, "c"));

        let messages: Vec<_> = log.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "c"]);
        assert_eq!(log.dropped_count(), 1);
        assert_eq!(log.warning_count(), 2);
        assert_eq!(log.error_count(), 1);
    }

    #[test]
    fn test_drain_empties() {
        let mut log = EventLog::default();
        log.record(diagnostic(DiagnosticLevel::Info, "a"));
        assert_eq!(log.drain().len(), 1);
        assert!(log.is_empty());
        assert_eq!(log.capacity(), DEFAULT_EVENT_LOG_CAPACITY);
    }
}

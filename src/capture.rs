use crate::backend::{Backend, BackendError};
use crate::level::{AtomicLevel, Level};
use crate::record::LogRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// A backend that keeps every accepted record in memory.
///
/// Useful for tests that assert on what was logged, and for embedding the
/// logger where records are inspected programmatically.
#[derive(Default)]
pub struct CaptureBackend {
    level: AtomicLevel,
    records: Mutex<Vec<LogRecord>>,
    flushes: AtomicU64,
}

impl CaptureBackend {
    pub fn new(level: impl Into<AtomicLevel>) -> Self {
        CaptureBackend {
            level: level.into(),
            records: Mutex::new(Vec::new()),
            flushes: AtomicU64::new(0),
        }
    }

    /// Snapshot of the records captured so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Remove and return the records captured so far.
    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn level(&self) -> &AtomicLevel {
        &self.level
    }
}

impl Backend for CaptureBackend {
    fn enabled(&self, level: Level) -> bool {
        self.level.enabled(level)
    }

    fn handle(&self, record: LogRecord) {
        if !self.enabled(record.level) {
            return;
        }
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }

    fn flush(&self) -> Result<(), BackendError> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

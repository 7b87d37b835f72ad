use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::app::ports::EventSink;
use crate::record::TranslatedRecord;

/// Collects every record in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<TranslatedRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TranslatedRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TranslatedRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for MemorySink {
    fn send(&self, record: TranslatedRecord) {
        self.lock().push(record);
    }
}

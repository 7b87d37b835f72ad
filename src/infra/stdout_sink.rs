use std::io::Write;
use tracing::warn;

use crate::app::ports::EventSink;
use crate::record::TranslatedRecord;

/// Writes each record as one JSON line on stdout. Used by `replay`.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn send(&self, record: TranslatedRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "could not serialize record");
                return;
            }
        };
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", line) {
            warn!(error = %e, "could not write record to stdout");
        }
    }
}

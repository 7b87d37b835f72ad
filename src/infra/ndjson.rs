//! Newline-delimited JSON framing for recorded envelope captures.

use crate::envelope::Envelope;
use crate::error::NozzleError;

/// Longest line accepted before it is reported and skipped.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reassembles lines from arbitrarily split byte chunks.
#[derive(Debug)]
pub struct LineDecoder {
    pending: Vec<u8>,
    /// Bytes of `pending` already known to hold no newline.
    scanned: usize,
    /// Dropping the tail of an oversized line until its newline arrives.
    discarding: bool,
    max_line: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            discarding: false,
            max_line,
        }
    }

    /// Feed a chunk and return every complete, non-blank line it finishes.
    /// A line longer than the limit yields one `Decode` error in its place.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, NozzleError>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.pending[start + self.scanned..]
            .iter()
            .position(|b| *b == b'\n')
        {
            let end = start + self.scanned + offset;
            if self.discarding {
                self.discarding = false;
            } else if end - start > self.max_line {
                lines.push(Err(self.oversized()));
            } else if let Some(line) = text(&self.pending[start..end]) {
                lines.push(Ok(line));
            }
            start = end + 1;
            self.scanned = 0;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();
        if self.pending.len() > self.max_line {
            if !self.discarding {
                lines.push(Err(self.oversized()));
                self.discarding = true;
            }
            self.pending.clear();
            self.scanned = 0;
        }
        lines
    }

    /// Whatever remains after the input ends, if it is not blank.
    pub fn finish(&mut self) -> Option<Result<String, NozzleError>> {
        let rest = std::mem::take(&mut self.pending);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        text(&rest).map(Ok)
    }

    fn oversized(&self) -> NozzleError {
        NozzleError::Decode(format!("line exceeds {} bytes", self.max_line))
    }
}

fn text(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Decode one line; malformed input becomes a transport-level error.
pub fn decode_line(line: &str) -> Result<Envelope, NozzleError> {
    Envelope::from_json(line).map_err(|e| NozzleError::Decode(e.to_string()))
}

//! Replays recorded envelopes from a file or stdin.

use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::ports::{EnvelopeSource, EnvelopeStreams};
use crate::envelope::Envelope;
use crate::error::NozzleError;
use crate::infra::ndjson::{decode_line, LineDecoder};

const ENVELOPE_BUFFER: usize = 1024;
const ERROR_BUFFER: usize = 64;
const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayInput {
    Stdin,
    Path(PathBuf),
}

impl ReplayInput {
    /// `-` means stdin.
    pub fn parse(input: &str) -> Self {
        if input == "-" {
            Self::Stdin
        } else {
            Self::Path(PathBuf::from(input))
        }
    }
}

/// Both channels close once the input is exhausted.
pub struct FileSource {
    input: ReplayInput,
}

impl FileSource {
    pub fn new(input: ReplayInput) -> Self {
        Self { input }
    }
}

impl EnvelopeSource for FileSource {
    fn start(self: Box<Self>) -> EnvelopeStreams {
        let (env_tx, env_rx) = mpsc::channel(ENVELOPE_BUFFER);
        let (err_tx, err_rx) = mpsc::channel(ERROR_BUFFER);
        tokio::spawn(async move {
            let reader: Box<dyn AsyncRead + Unpin + Send> = match &self.input {
                ReplayInput::Stdin => Box::new(tokio::io::stdin()),
                ReplayInput::Path(path) => match tokio::fs::File::open(path).await {
                    Ok(file) => Box::new(file),
                    Err(e) => {
                        let _ = err_tx.send(NozzleError::Io(e)).await;
                        return;
                    }
                },
            };
            info!(input = ?self.input, "replaying envelopes");
            pump_lines(reader, env_tx, err_tx).await;
        });
        EnvelopeStreams {
            envelopes: env_rx,
            errors: err_rx,
        }
    }
}

async fn pump_lines<R>(
    mut reader: R,
    env_tx: mpsc::Sender<Envelope>,
    err_tx: mpsc::Sender<NozzleError>,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut count = 0u64;
    loop {
        let (lines, eof): (Vec<Result<String, NozzleError>>, bool) = match reader.read(&mut buf).await {
            Ok(0) => (decoder.finish().into_iter().collect(), true),
            Ok(n) => (decoder.push(&buf[..n]), false),
            Err(e) => {
                let _ = err_tx.send(NozzleError::Io(e)).await;
                break;
            }
        };
        for line in lines {
            match line.and_then(|line| decode_line(&line)) {
                Ok(envelope) => {
                    if env_tx.send(envelope).await.is_err() {
                        return;
                    }
                    count += 1;
                }
                Err(e) => {
                    if err_tx.send(e).await.is_err() {
                        return;
                    }
                }
            }
        }
        if eof {
            break;
        }
    }
    debug!(count, "replay input exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ndjson::MAX_LINE_BYTES;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_replay_input_parse() {
        assert_eq!(ReplayInput::parse("-"), ReplayInput::Stdin);
        assert_eq!(
            ReplayInput::parse("capture.ndjson"),
            ReplayInput::Path(PathBuf::from("capture.ndjson"))
        );
    }

    #[tokio::test]
    async fn test_file_source_reads_until_eof() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"origin":"a","eventType":"LogMessage"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"origin":"b","eventType":"ValueMetric"}}"#).unwrap();

        let source = Box::new(FileSource::new(ReplayInput::Path(file.path().to_path_buf())));
        let mut streams = source.start();

        let mut origins = Vec::new();
        while let Some(env) = streams.envelopes.recv().await {
            origins.push(env.origin.unwrap_or_default());
        }
        assert_eq!(origins, vec!["a", "b"]);

        let err = streams.errors.recv().await.unwrap();
        assert!(matches!(err, NozzleError::Decode(_)));
        assert!(streams.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_file_without_trailing_newline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"origin":"last","eventType":"Error"}}"#).unwrap();

        let source = Box::new(FileSource::new(ReplayInput::Path(file.path().to_path_buf())));
        let mut streams = source.start();
        let env = streams.envelopes.recv().await.unwrap();
        assert_eq!(env.origin.as_deref(), Some("last"));
        assert!(streams.envelopes.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_line_is_a_decode_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", "x".repeat(MAX_LINE_BYTES + 1)).unwrap();
        writeln!(file, r#"{{"origin":"after","eventType":"LogMessage"}}"#).unwrap();

        let source = Box::new(FileSource::new(ReplayInput::Path(file.path().to_path_buf())));
        let mut streams = source.start();
        let env = streams.envelopes.recv().await.unwrap();
        assert_eq!(env.origin.as_deref(), Some("after"));
        assert!(streams.envelopes.recv().await.is_none());

        let err = streams.errors.recv().await.unwrap();
        assert!(err.to_string().contains("exceeds"));
        assert!(streams.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_reports_io_error() {
        let source = Box::new(FileSource::new(ReplayInput::Path(PathBuf::from(
            "/nonexistent/nozzle/input.ndjson",
        ))));
        let mut streams = source.start();
        assert!(matches!(streams.errors.recv().await, Some(NozzleError::Io(_))));
        assert!(streams.envelopes.recv().await.is_none());
    }
}

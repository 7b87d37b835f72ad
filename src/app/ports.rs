use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::{NozzleError, Result};
use crate::record::TranslatedRecord;

/// Remote lookup from an application GUID to its display name.
#[async_trait]
pub trait AppNameResolver: Send + Sync {
    async fn app_name(&self, app_guid: &str) -> Result<String>;
}

/// Destination for translated records. Sending never blocks on delivery and
/// never reports failure to the caller.
pub trait EventSink: Send + Sync {
    fn send(&self, record: TranslatedRecord);
}

/// The two parallel streams a firehose connection produces.
pub struct EnvelopeStreams {
    pub envelopes: mpsc::Receiver<Envelope>,
    pub errors: mpsc::Receiver<NozzleError>,
}

/// An authenticated producer of envelopes and transport errors.
pub trait EnvelopeSource: Send {
    /// Spawn the producer and hand back its receiving ends.
    fn start(self: Box<Self>) -> EnvelopeStreams;
}

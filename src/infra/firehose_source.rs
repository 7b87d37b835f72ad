//! Live envelope stream from the traffic controller.
//!
//! The firehose is a websocket at `{doppler}/firehose/{subscription}` carrying
//! one dropsonde protobuf envelope per binary frame. A dropped or refused
//! connection is reported on the error channel and retried after a fixed delay,
//! until the envelope receiver goes away.

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::{debug, info, warn};

use crate::app::ports::{EnvelopeSource, EnvelopeStreams};
use crate::constants::RECONNECT_DELAY_SECS;
use crate::envelope::Envelope;
use crate::error::{NozzleError, Result};
use crate::infra::auth::TokenSource;
use crate::infra::dropsonde::decode_frame;

const ENVELOPE_BUFFER: usize = 4096;
const ERROR_BUFFER: usize = 256;

pub struct FirehoseSource {
    stream_url: String,
    tokens: Arc<TokenSource>,
    skip_ssl: bool,
    reconnect_delay: Duration,
}

impl FirehoseSource {
    pub fn new(firehose_url: &str, subscription_id: &str, tokens: Arc<TokenSource>) -> Self {
        Self {
            stream_url: format!(
                "{}/firehose/{}",
                firehose_url.trim_end_matches('/'),
                subscription_id
            ),
            tokens,
            skip_ssl: false,
            reconnect_delay: Duration::from_secs(RECONNECT_DELAY_SECS),
        }
    }

    /// Accept self-signed traffic controller certificates.
    pub fn with_skip_ssl(mut self, skip_ssl: bool) -> Self {
        self.skip_ssl = skip_ssl;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    async fn pump(self, env_tx: mpsc::Sender<Envelope>, err_tx: mpsc::Sender<NozzleError>) {
        loop {
            let error = match self.stream_once(&env_tx, &err_tx).await {
                Ok(()) => NozzleError::Transport("firehose stream closed by server".into()),
                Err(e) => e,
            };
            if env_tx.is_closed() {
                break;
            }
            warn!(error = %error, delay = ?self.reconnect_delay, "firehose connection lost");
            if err_tx.send(error).await.is_err() {
                break;
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn stream_once(
        &self,
        env_tx: &mpsc::Sender<Envelope>,
        err_tx: &mpsc::Sender<NozzleError>,
    ) -> Result<()> {
        let token = self.tokens.token().await?;
        let mut request = self.stream_url.as_str().into_client_request()?;
        let auth = HeaderValue::from_str(&format!("bearer {token}")).map_err(|e| {
            NozzleError::Auth {
                message: format!("token is not a valid header value: {e}"),
            }
        })?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.skip_ssl)
            .build()
            .map_err(|e| NozzleError::Transport(format!("TLS setup failed: {e}")))?;

        let connected =
            connect_async_tls_with_config(request, None, false, Some(Connector::NativeTls(tls)))
                .await;
        let mut ws = match connected {
            Ok((ws, _)) => ws,
            Err(WsError::Http(resp)) => {
                if resp.status() == StatusCode::UNAUTHORIZED {
                    self.tokens.invalidate().await;
                }
                let message = resp
                    .body()
                    .as_deref()
                    .map(|body| String::from_utf8_lossy(body).trim().to_string())
                    .unwrap_or_default();
                return Err(NozzleError::Upstream {
                    service: "Traffic controller",
                    status: resp.status().as_u16(),
                    message,
                });
            }
            Err(e) => return Err(e.into()),
        };
        info!(url = %self.stream_url, "connected to firehose");

        while let Some(message) = ws.next().await {
            match message? {
                Message::Binary(frame) => {
                    if !forward(&frame, env_tx, err_tx).await {
                        let _ = ws.close(None).await;
                        return Ok(());
                    }
                }
                Message::Close(frame) => {
                    debug!(?frame, "firehose sent close");
                    break;
                }
                other => debug!(kind = ?other, "ignoring non-binary firehose frame"),
            }
        }
        Ok(())
    }
}

/// Returns false once the envelope receiver is gone.
async fn forward(
    frame: &[u8],
    env_tx: &mpsc::Sender<Envelope>,
    err_tx: &mpsc::Sender<NozzleError>,
) -> bool {
    match decode_frame(frame) {
        Ok(envelope) => env_tx.send(envelope).await.is_ok(),
        Err(e) => {
            let _ = err_tx.send(e).await;
            !env_tx.is_closed()
        }
    }
}

impl EnvelopeSource for FirehoseSource {
    fn start(self: Box<Self>) -> EnvelopeStreams {
        let (env_tx, env_rx) = mpsc::channel(ENVELOPE_BUFFER);
        let (err_tx, err_rx) = mpsc::channel(ERROR_BUFFER);
        let source = *self;
        tokio::spawn(source.pump(env_tx, err_tx));
        EnvelopeStreams {
            envelopes: env_rx,
            errors: err_rx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::auth::Grant;

    fn tokens() -> Arc<TokenSource> {
        Arc::new(TokenSource::new(
            reqwest::Client::new(),
            "https://uaa.example.com",
            Grant::ClientCredentials {
                client_id: "c".into(),
                client_secret: "s".into(),
            },
        ))
    }

    #[test]
    fn test_stream_url() {
        let source = FirehoseSource::new("wss://doppler.example.com:443/", "honeycomb", tokens());
        assert_eq!(
            source.stream_url(),
            "wss://doppler.example.com:443/firehose/honeycomb"
        );
    }
}

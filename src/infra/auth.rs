//! UAA token acquisition and firehose bootstrap.

use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::AppNameCache;
use crate::config::{AuthMethod, NozzleConfig};
use crate::error::{NozzleError, Result};
use crate::infra::cloud_controller::CloudControllerResolver;
use crate::infra::http_client::ensure_success;

/// Client id the CF CLI uses for password grants.
const CF_CLIENT_ID: &str = "cf";
/// Refresh this long before the advertised expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum Grant {
    Password { username: String, password: String },
    ClientCredentials { client_id: String, client_secret: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.refresh_at.map_or(true, |at| Instant::now() < at)
    }
}

/// Fetches and caches a UAA bearer token.
pub struct TokenSource {
    client: Client,
    token_url: String,
    grant: Grant,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(client: Client, uaa_url: &str, grant: Grant) -> Self {
        Self {
            client,
            token_url: format!("{}/oauth/token", uaa_url.trim_end_matches('/')),
            grant,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, fetching a new one when none is cached or the
    /// cached one is about to expire.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }
        let token = self.fetch().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Forget the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let request = match &self.grant {
            Grant::Password { username, password } => self
                .client
                .post(&self.token_url)
                .basic_auth(CF_CLIENT_ID, Some(""))
                .form(&[
                    ("grant_type", "password"),
                    ("username", username.as_str()),
                    ("password", password.as_str()),
                ]),
            Grant::ClientCredentials {
                client_id,
                client_secret,
            } => self
                .client
                .post(&self.token_url)
                .basic_auth(client_id, Some(client_secret))
                .form(&[("grant_type", "client_credentials")]),
        };

        let resp = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let resp = ensure_success(resp, "UAA").await.map_err(|e| NozzleError::Auth {
            message: e.to_string(),
        })?;
        let body: TokenResponse = resp.json().await?;
        if body.access_token.is_empty() {
            return Err(NozzleError::Auth {
                message: "UAA returned an empty access token".into(),
            });
        }

        debug!(expires_in = ?body.expires_in, "fetched UAA token");
        let refresh_at = body
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN));
        Ok(CachedToken {
            access_token: body.access_token,
            refresh_at,
        })
    }
}

/// Subset of the Cloud Controller's `/v2/info` document.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiInfo {
    pub token_endpoint: String,
    #[serde(default)]
    pub doppler_logging_endpoint: Option<String>,
}

pub async fn fetch_api_info(client: &Client, api_url: &str) -> Result<ApiInfo> {
    let url = format!("{}/v2/info", api_url.trim_end_matches('/'));
    let resp = client.get(&url).send().await?;
    let resp = ensure_success(resp, "Cloud Controller").await?;
    Ok(resp.json().await?)
}

/// Everything the stream needs once authentication has succeeded.
pub struct Bootstrap {
    pub firehose_url: String,
    pub tokens: Arc<TokenSource>,
    pub cache: Arc<AppNameCache>,
}

/// Authenticate, locate the firehose and build the app name cache.
/// Fails fast when the first token cannot be obtained.
pub async fn bootstrap(config: &NozzleConfig, client: &Client) -> Result<Bootstrap> {
    match config.auth_method()? {
        AuthMethod::Api {
            url,
            username,
            password,
        } => {
            info!(api_url = %url, "fetching auth token via API");
            let api = fetch_api_info(client, &url).await?;
            let tokens = Arc::new(TokenSource::new(
                client.clone(),
                &api.token_endpoint,
                Grant::Password { username, password },
            ));
            tokens.token().await?;

            let firehose_url = api
                .doppler_logging_endpoint
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| {
                    NozzleError::Config("traffic controller URL from the API was blank".into())
                })?;
            let resolver = CloudControllerResolver::new(client.clone(), &url, tokens.clone());
            Ok(Bootstrap {
                firehose_url: to_ws_scheme(&firehose_url),
                tokens,
                cache: Arc::new(AppNameCache::new(Arc::new(resolver))),
            })
        }
        AuthMethod::Uaa {
            url,
            username,
            password,
            doppler_url,
        } => {
            info!(uaa_url = %url, "fetching auth token via UAA");
            let tokens = Arc::new(TokenSource::new(
                client.clone(),
                &url,
                Grant::ClientCredentials {
                    client_id: username,
                    client_secret: password,
                },
            ));
            tokens.token().await?;
            Ok(Bootstrap {
                firehose_url: to_ws_scheme(&doppler_url),
                tokens,
                cache: Arc::new(AppNameCache::uninitialized()),
            })
        }
    }
}

/// The firehose is a websocket; an http(s) traffic controller URL is dialed as ws(s).
pub fn to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

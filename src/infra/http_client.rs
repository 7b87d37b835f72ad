use reqwest::{Client, Response};
use std::time::Duration;

use crate::error::{NozzleError, Result};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for bounded request/response calls (UAA, Cloud Controller, Honeycomb).
pub fn build_client(skip_ssl: bool) -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .danger_accept_invalid_certs(skip_ssl)
        .build()?;
    Ok(client)
}

/// Pass 2xx responses through; turn anything else into `Upstream` with the body.
pub async fn ensure_success(resp: Response, service: &'static str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(NozzleError::Upstream {
        service,
        status: status.as_u16(),
        message: message.trim().to_string(),
    })
}

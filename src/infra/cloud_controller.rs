use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::app::ports::AppNameResolver;
use crate::error::Result;
use crate::infra::auth::TokenSource;
use crate::infra::http_client::ensure_success;

#[derive(Debug, Deserialize)]
struct AppResource {
    name: String,
}

/// Resolves application names through the Cloud Controller v3 API.
pub struct CloudControllerResolver {
    client: Client,
    api_url: String,
    tokens: Arc<TokenSource>,
}

impl CloudControllerResolver {
    pub fn new(client: Client, api_url: &str, tokens: Arc<TokenSource>) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn app_url(&self, app_guid: &str) -> String {
        format!("{}/v3/apps/{}", self.api_url, app_guid)
    }
}

#[async_trait]
impl AppNameResolver for CloudControllerResolver {
    async fn app_name(&self, app_guid: &str) -> Result<String> {
        let token = self.tokens.token().await?;
        let resp = self
            .client
            .get(self.app_url(app_guid))
            .bearer_auth(&token)
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        let resp = ensure_success(resp, "Cloud Controller").await?;
        let app: AppResource = resp.json().await?;
        debug!(app_guid, app_name = %app.name, "resolved app name");
        Ok(app.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::auth::Grant;

    #[test]
    fn test_app_url() {
        let tokens = Arc::new(TokenSource::new(
            Client::new(),
            "https://uaa.example.com",
            Grant::Password {
                username: "u".into(),
                password: "p".into(),
            },
        ));
        let resolver = CloudControllerResolver::new(Client::new(), "https://api.example.com/", tokens);
        assert_eq!(
            resolver.app_url("6f1c1c2e"),
            "https://api.example.com/v3/apps/6f1c1c2e"
        );
    }
}

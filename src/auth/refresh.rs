// Token refresh against the identity provider

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::RwLock;

use super::types::{FirebaseRefreshResponse, RefreshedToken};

/// Default Firebase secure-token endpoint
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1/token";

/// Identity provider capable of issuing a fresh bearer token on demand
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Force a refresh, ignoring any token the provider may have cached
    async fn force_refresh(&self) -> Result<RefreshedToken>;
}

/// Refreshes Firebase ID tokens with a long-lived refresh token
pub struct FirebaseRefresher {
    client: Client,
    token_endpoint: String,
    api_key: String,

    /// Rotated whenever the provider hands back a new one
    refresh_token: RwLock<String>,
}

impl FirebaseRefresher {
    pub fn new(
        client: Client,
        token_endpoint: impl Into<String>,
        api_key: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_endpoint: token_endpoint.into(),
            api_key: api_key.into(),
            refresh_token: RwLock::new(refresh_token.into()),
        }
    }

    /// Current refresh token (may have been rotated since construction)
    pub async fn refresh_token(&self) -> String {
        self.refresh_token.read().await.clone()
    }
}

#[async_trait]
impl TokenRefresher for FirebaseRefresher {
    async fn force_refresh(&self) -> Result<RefreshedToken> {
        tracing::info!("Refreshing ID token via Firebase secure token endpoint...");

        let refresh_token = self.refresh_token.read().await.clone();

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_endpoint)
            .query(&[("key", self.api_key.as_str())])
            .form(&form)
            .send()
            .await
            .context("Failed to send token refresh request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                "Token refresh failed: status={}, body={}",
                status,
                error_text
            );

            // Firebase wraps failures as {"error": {"message": "..."}}
            if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&error_text) {
                if let Some(reason) = error_json
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                {
                    tracing::error!("Identity provider error: {}", reason);
                }
            }

            anyhow::bail!("Token refresh failed: {} - {}", status, error_text);
        }

        let data: FirebaseRefreshResponse = response
            .json()
            .await
            .context("Failed to parse token refresh response")?;

        if data.id_token.is_empty() {
            anyhow::bail!("Token refresh response does not contain id_token");
        }

        if let Some(new_refresh_token) = data.refresh_token.filter(|t| !t.is_empty()) {
            *self.refresh_token.write().await = new_refresh_token;
        }

        let provider_expires_in = data.expires_in.and_then(|s| s.parse::<u64>().ok());

        tracing::info!(
            user_id = data.user_id.as_deref().unwrap_or("unknown"),
            provider_expires_in = ?provider_expires_in,
            "ID token refreshed"
        );

        Ok(RefreshedToken {
            token: data.id_token,
            provider_expires_in,
            user_id: data.user_id,
        })
    }
}

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use super::clock::{Clock, SystemClock};
use super::refresh::TokenRefresher;
use super::types::CredentialState;

/// Lifetime assigned to a freshly refreshed token.
/// Kept below the provider's one hour so tokens are replaced before they lapse.
pub const TOKEN_LIFETIME_MINUTES: i64 = 55;

/// Credential freshness failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// No credential has been populated (not logged in)
    #[error("User state not populated yet")]
    Unauthenticated,

    /// The identity provider rejected the forced refresh
    #[error("Error refreshing token. Please login again. ({reason})")]
    RefreshFailed { reason: String },
}

/// Credential manager
/// Holds the bearer credential and refreshes it when stale.
/// Concurrent callers that find the token stale share a single refresh.
pub struct CredentialManager {
    /// Current credential, `None` until login
    state: Arc<RwLock<Option<CredentialState>>>,

    /// Serializes refresh attempts
    refresh_lock: Mutex<()>,

    /// Identity provider
    refresher: Arc<dyn TokenRefresher>,

    clock: Arc<dyn Clock>,
}

impl CredentialManager {
    /// Create an empty manager backed by the system clock
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self::with_clock(refresher, Arc::new(SystemClock))
    }

    /// Create an empty manager with an explicit clock
    pub fn with_clock(refresher: Arc<dyn TokenRefresher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
            refresh_lock: Mutex::new(()),
            refresher,
            clock,
        }
    }

    /// Store a credential obtained at login
    pub async fn populate(&self, token: String, expires_at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        *state = Some(CredentialState { token, expires_at });
        tracing::debug!("Credential populated, expires: {}", expires_at.to_rfc3339());
    }

    /// Drop the credential (logout)
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = None;
        tracing::debug!("Credential cleared");
    }

    /// Copy of the current credential
    pub async fn snapshot(&self) -> Option<CredentialState> {
        self.state.read().await.clone()
    }

    /// `None` when no credential is present
    async fn is_fresh(&self) -> Option<bool> {
        let state = self.state.read().await;
        state
            .as_ref()
            .map(|cred| is_fresh_at(cred.expires_at, self.clock.now()))
    }

    /// Make sure a non-expired credential is present, refreshing if needed
    pub async fn ensure_fresh_credential(&self) -> Result<(), AuthError> {
        match self.is_fresh().await {
            None => {
                tracing::error!("User state not populated yet");
                return Err(AuthError::Unauthenticated);
            }
            Some(true) => return Ok(()),
            Some(false) => {}
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        match self.is_fresh().await {
            None => {
                tracing::error!("User state cleared while waiting for refresh");
                return Err(AuthError::Unauthenticated);
            }
            Some(true) => {
                tracing::debug!("Token refreshed by a concurrent caller");
                return Ok(());
            }
            Some(false) => {}
        }

        tracing::debug!("Token expired, forcing refresh...");

        match self.refresher.force_refresh().await {
            Ok(refreshed) => {
                let expires_at = self.clock.now() + Duration::minutes(TOKEN_LIFETIME_MINUTES);
                let mut state = self.state.write().await;
                *state = Some(CredentialState {
                    token: refreshed.token,
                    expires_at,
                });
                tracing::info!("Token refreshed, expires: {}", expires_at.to_rfc3339());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error refreshing token. Please login again. {:#}", e);
                Err(AuthError::RefreshFailed {
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    /// Get a non-expired access token, refreshing if necessary
    pub async fn access_token(&self) -> Result<String, AuthError> {
        self.ensure_fresh_credential().await?;

        let state = self.state.read().await;
        state
            .as_ref()
            .map(|cred| cred.token.clone())
            .ok_or(AuthError::Unauthenticated)
    }
}

/// A token is fresh strictly before its expiry
pub fn is_fresh_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now < expires_at
}

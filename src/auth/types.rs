// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer credential held by the credential manager
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialState {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token data returned by an identity provider after a forced refresh
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub token: String,

    /// Lifetime the provider claims for the token, informational only
    pub provider_expires_in: Option<u64>,

    /// Account the token was issued for, when the provider reports one
    pub user_id: Option<String>,
}

/// Session persisted between CLI runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Firebase secure-token refresh response
///
/// `expires_in` arrives as a decimal string.
#[derive(Deserialize)]
pub struct FirebaseRefreshResponse {
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<String>,
    pub user_id: Option<String>,
}

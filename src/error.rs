// Error handling module
// Defines the errors surfaced by the API client

use thiserror::Error;

use crate::auth::AuthError;
use crate::models::ApiResponse;

/// Errors that can occur during an API call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// No credential has been populated
    #[error("Refresh the page or login again.")]
    Unauthenticated,

    /// The credential was stale and could not be refreshed
    #[error("Refresh the page or login again.")]
    RefreshFailed { reason: String },

    /// Server answered with a status other than 200
    #[error("Connection error {status} {status_text}")]
    HttpError { status: u16, status_text: String },

    /// Network failure or undecodable body
    #[error("{0}")]
    TransportError(String),

    /// Server answered 200 but reported `status: false` in the envelope
    #[error("{message}")]
    Rejected { message: String },

    /// URL could not be built from the configured base
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => ClientError::Unauthenticated,
            AuthError::RefreshFailed { reason } => ClientError::RefreshFailed { reason },
        }
    }
}

impl ClientError {
    /// Wire-shaped failure: `{"status": false, "message": "..."}`
    pub fn to_failure(&self) -> ApiResponse<serde_json::Value> {
        ApiResponse {
            status: false,
            data: None,
            message: Some(self.to_string()),
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

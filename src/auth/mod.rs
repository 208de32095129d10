// Authentication module
// Holds the bearer credential and keeps it fresh

mod clock;
mod credentials;
mod manager;
mod refresh;
mod types;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-utils"))]
pub use clock::ManualClock;
pub use credentials::{clear_session, default_session_path, load_session, save_session};
pub use manager::{is_fresh_at, AuthError, CredentialManager, TOKEN_LIFETIME_MINUTES};
pub use refresh::{FirebaseRefresher, TokenRefresher, DEFAULT_TOKEN_ENDPOINT};
pub use types::{CredentialState, RefreshedToken, StoredSession};

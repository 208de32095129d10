use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::auth::{default_session_path, DEFAULT_TOKEN_ENDPOINT};

/// Origin the relative API path is joined onto when nothing else is configured
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";

/// Relative API path used when `AGENTOS_API_URL` is unset
pub const DEFAULT_API_PATH: &str = "/v1/api";

/// Agent OS Platform client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// API base URL (absolute, or a path joined onto the origin)
    #[arg(short = 'u', long, env = "AGENTOS_API_URL")]
    pub api_url: Option<String>,

    /// Origin used to resolve a relative API path
    #[arg(long, env = "AGENTOS_ORIGIN", default_value = DEFAULT_ORIGIN)]
    pub origin: String,

    /// Firebase web API key used for token refresh
    #[arg(short = 'k', long, env = "FIREBASE_API_KEY")]
    pub api_key: Option<String>,

    /// Identity provider token endpoint
    #[arg(long, env = "AGENTOS_TOKEN_ENDPOINT", default_value = DEFAULT_TOKEN_ENDPOINT)]
    pub token_endpoint: String,

    /// Path to the stored session file
    #[arg(short = 's', long, env = "AGENTOS_SESSION_FILE")]
    pub session_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "30")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds (unset: no timeout)
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Store a session from a refresh token, verifying it with a forced refresh
    Login {
        /// Long-lived refresh token issued at sign-in
        #[arg(long, env = "AGENTOS_REFRESH_TOKEN")]
        refresh_token: String,
    },

    /// Remove the stored session
    Logout,

    /// Print the server version (no login required)
    Version,

    #[command(flatten)]
    Api(ApiCommand),
}

/// Commands that call the backend with a bearer credential
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ApiCommand {
    /// List messages of a session
    Messages {
        #[arg(long)]
        session_id: String,

        /// Only messages after this cursor
        #[arg(long)]
        after: Option<String>,
    },

    /// Manage sessions
    #[command(subcommand)]
    Sessions(SessionCommand),

    /// List agent configurations
    Agents,

    /// List skill configurations
    Skills,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// List sessions of the current user
    List,

    /// Create a session for an agency
    Create {
        #[arg(long)]
        agency_id: String,
    },

    /// Delete a session
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    // API
    pub base_url: String,

    // Identity provider
    pub firebase_api_key: Option<String>,
    pub token_endpoint: String,
    pub session_file: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: Option<u64>,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > .env > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let base_url = resolve_base_url(args.api_url.as_deref(), &args.origin);
        reqwest::Url::parse(&base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;

        Ok(Config {
            base_url,
            firebase_api_key: args.api_key.filter(|k| !k.is_empty()),
            token_endpoint: args.token_endpoint,
            session_file: args
                .session_file
                .map(|s| expand_tilde(&s))
                .unwrap_or_else(default_session_path),
            http_connect_timeout: args.connect_timeout,
            http_request_timeout: args.request_timeout,
            log_level: args.log_level,
        })
    }

    /// Firebase API key, required for anything that may refresh a token
    pub fn require_api_key(&self) -> Result<&str> {
        self.firebase_api_key
            .as_deref()
            .context("FIREBASE_API_KEY is required (use -k or set FIREBASE_API_KEY env var)")
    }

    /// API key for the refresher of an API command
    ///
    /// Without a stored session no refresh can happen and the key may be absent.
    pub fn refresh_api_key(&self, has_session: bool) -> Result<String> {
        if has_session {
            Ok(self.require_api_key()?.to_string())
        } else {
            Ok(self.firebase_api_key.clone().unwrap_or_default())
        }
    }
}

/// Resolve the API base URL
///
/// An absolute configured value is used as is. A configured path, or the
/// default relative path when nothing is configured, is joined onto `origin`.
pub fn resolve_base_url(configured: Option<&str>, origin: &str) -> String {
    let path = match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            return url.trim_end_matches('/').to_string();
        }
        Some(path) => path,
        None => DEFAULT_API_PATH,
    };

    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        path.trim_start_matches('/').trim_end_matches('/')
    )
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

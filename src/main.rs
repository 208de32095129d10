use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use agentos_client::auth::{self, CredentialManager, FirebaseRefresher, StoredSession, TokenRefresher};
use agentos_client::config::{ApiCommand, Command, Config, SessionCommand};
use agentos_client::error::ClientError;
use agentos_client::http_client::ApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!("API base URL: {}", config.base_url);

    match command {
        Command::Login { refresh_token } => login(&config, refresh_token).await,
        Command::Logout => {
            auth::clear_session(&config.session_file)?;
            tracing::info!("Session removed: {}", config.session_file.display());
            Ok(())
        }
        Command::Version => {
            let client = ApiClient::new(
                Arc::new(CredentialManager::new(Arc::new(NoRefresh))),
                config.base_url.clone(),
                config.http_connect_timeout,
                config.http_request_timeout,
            )?;
            match client.fetch_version().await {
                Some(version) => print_json(&version),
                None => {
                    print_json(&serde_json::Value::Null)?;
                    std::process::exit(1);
                }
            }
        }
        Command::Api(api_command) => run_authenticated(&config, api_command).await,
    }
}

/// Verify a refresh token with a forced refresh, then persist the session
async fn login(config: &Config, refresh_token: String) -> Result<()> {
    let refresher = FirebaseRefresher::new(
        http_client(config)?,
        config.token_endpoint.clone(),
        config.require_api_key()?,
        refresh_token,
    );

    let refreshed = refresher
        .force_refresh()
        .await
        .context("Login failed: refresh token was rejected")?;

    let session = StoredSession {
        id_token: refreshed.token,
        refresh_token: refresher.refresh_token().await,
        expires_at: Utc::now() + chrono::Duration::minutes(auth::TOKEN_LIFETIME_MINUTES),
        user_id: refreshed.user_id,
    };
    auth::save_session(&config.session_file, &session)?;

    println!("Logged in. Session saved to {}", config.session_file.display());
    Ok(())
}

async fn run_authenticated(config: &Config, command: ApiCommand) -> Result<()> {
    let stored = auth::load_session(&config.session_file)?;

    let refresher = Arc::new(FirebaseRefresher::new(
        http_client(config)?,
        config.token_endpoint.clone(),
        config.refresh_api_key(stored.is_some())?,
        stored
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .unwrap_or_default(),
    ));

    let credentials = Arc::new(CredentialManager::new(refresher.clone()));
    if let Some(ref session) = stored {
        credentials
            .populate(session.id_token.clone(), session.expires_at)
            .await;
    }

    let client = ApiClient::new(
        credentials.clone(),
        config.base_url.clone(),
        config.http_connect_timeout,
        config.http_request_timeout,
    )?;

    let result = match command {
        ApiCommand::Messages { session_id, after } => {
            client.fetch_messages(&session_id, after.as_deref()).await
        }
        ApiCommand::Sessions(SessionCommand::List) => client.list_sessions().await,
        ApiCommand::Sessions(SessionCommand::Create { agency_id }) => {
            client.create_session(&agency_id).await
        }
        ApiCommand::Sessions(SessionCommand::Delete { id }) => client
            .delete_session(&id)
            .await
            .map(serde_json::Value::String),
        ApiCommand::Agents => client.list_agents().await,
        ApiCommand::Skills => client.list_skills().await,
    };

    // Persist a token refreshed during this run
    if let (Some(session), Some(state)) = (stored, credentials.snapshot().await) {
        if state.token != session.id_token {
            let updated = StoredSession {
                id_token: state.token,
                refresh_token: refresher.refresh_token().await,
                expires_at: state.expires_at,
                user_id: session.user_id,
            };
            auth::save_session(&config.session_file, &updated)?;
        }
    }

    match result {
        Ok(data) => print_json(&data),
        Err(e) => fail(e),
    }
}

fn http_client(config: &Config) -> Result<Client> {
    let mut builder =
        Client::builder().connect_timeout(Duration::from_secs(config.http_connect_timeout));
    if let Some(secs) = config.http_request_timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().context("Failed to create HTTP client")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the `{status: false, message}` failure and exit non-zero
fn fail(err: ClientError) -> Result<()> {
    print_json(&err.to_failure())?;
    std::process::exit(1);
}

/// Refresher for the unauthenticated version call, never invoked
struct NoRefresh;

#[async_trait::async_trait]
impl TokenRefresher for NoRefresh {
    async fn force_refresh(&self) -> Result<auth::RefreshedToken> {
        anyhow::bail!("No identity provider configured")
    }
}

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::CredentialManager;
use crate::error::{ClientError, Result};
use crate::models::{ApiResponse, VersionResponse};

/// Method, headers and optional JSON body of an outbound call
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body and the matching content type
    pub fn json(mut self, body: Value) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(body);
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

/// HTTP client for the Agent OS backend
/// Every authenticated call is preceded by a credential freshness check.
pub struct ApiClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Credential manager
    credentials: Arc<CredentialManager>,

    /// Resolved API base, without trailing slash
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        credentials: Arc<CredentialManager>,
        base_url: impl Into<String>,
        connect_timeout: u64,
        request_timeout: Option<u64>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder().connect_timeout(Duration::from_secs(connect_timeout));
        if let Some(secs) = request_timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, credentials, base_url))
    }

    /// Create an API client around an existing reqwest client
    pub fn with_client(
        client: Client,
        credentials: Arc<CredentialManager>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            credentials,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `{base}{path}` with the given query pairs
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        build_url(&self.base_url, path, query)
    }

    /// Issue an authenticated request and decode the JSON body
    ///
    /// Fails without touching the network when the credential cannot be
    /// made fresh. Only status 200 counts as success.
    pub async fn request(&self, url: Url, options: RequestOptions) -> Result<Value> {
        let token = match self.credentials.access_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Credential check failed, request not sent");
                return Err(e.into());
            }
        };

        let headers = merge_headers(&options.headers, &token)?;

        tracing::debug!(method = %options.method, url = %url, "Sending HTTP request");

        let mut builder = self
            .client
            .request(options.method.clone(), url.clone())
            .headers(headers);
        if let Some(ref body) = options.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let error_kind = categorize(&e);
                tracing::error!(
                    error_kind = error_kind,
                    error = %e,
                    url = %url,
                    "HTTP request error"
                );
                return Err(ClientError::TransportError(e.to_string()));
            }
        };

        let status = response.status();
        tracing::debug!(status = %status, "Received HTTP response");

        if status != StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            // Decoded only for the log line
            let error_body = serde_json::from_str::<Value>(&error_text)
                .unwrap_or_else(|_| Value::String(error_text));
            tracing::error!(
                status = status.as_u16(),
                url = %url,
                response_body = %error_body,
                "HTTP request failed with error response"
            );
            return Err(ClientError::HttpError {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            tracing::error!(error = %e, url = %url, "Failed to decode response body");
            ClientError::TransportError(e.to_string())
        })
    }

    /// Issue an authenticated request and unwrap the `{status, data}` envelope
    pub async fn request_data<T: DeserializeOwned>(
        &self,
        url: Url,
        options: RequestOptions,
    ) -> Result<T> {
        let body = self.request(url, options).await?;
        unwrap_envelope(body)
    }

    /// Message history of a session, optionally only messages after a cursor
    pub async fn fetch_messages(&self, session_id: &str, after: Option<&str>) -> Result<Value> {
        let url = message_list_url(&self.base_url, session_id, after)?;
        self.request_data(url, RequestOptions::get()).await
    }

    /// Server version; `None` on any failure
    ///
    /// Does not require a credential.
    pub async fn fetch_version(&self) -> Option<VersionResponse> {
        let url = match self.endpoint("/version", &[]) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build version URL");
                return None;
            }
        };

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, url = %url, "Failed to fetch version");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), url = %url, "Failed to fetch version");
            return None;
        }

        match response.json::<VersionResponse>().await {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::error!(error = %e, url = %url, "Failed to decode version response");
                None
            }
        }
    }

    /// Sessions of the current user
    pub async fn list_sessions(&self) -> Result<Value> {
        let url = self.endpoint("/session/list", &[])?;
        self.request_data(url, RequestOptions::get()).await
    }

    /// Start a session for an agency; returns the refreshed session list
    pub async fn create_session(&self, agency_id: &str) -> Result<Value> {
        let url = self.endpoint("/session", &[("agency_id", agency_id)])?;
        self.request_data(url, RequestOptions::post()).await
    }

    /// Delete a session; returns the server's confirmation message
    pub async fn delete_session(&self, session_id: &str) -> Result<String> {
        let url = self.endpoint("/session", &[("id", session_id)])?;
        let body = self.request(url, RequestOptions::delete()).await?;
        let envelope: ApiResponse<Value> = decode(body)?;
        if !envelope.status {
            return Err(rejected(envelope.message));
        }
        Ok(envelope.message.unwrap_or_default())
    }

    /// Agent configurations visible to the current user
    pub async fn list_agents(&self) -> Result<Value> {
        let url = self.endpoint("/agent/list", &[])?;
        self.request_data(url, RequestOptions::get()).await
    }

    /// Skill configurations visible to the current user
    pub async fn list_skills(&self) -> Result<Value> {
        let url = self.endpoint("/skill/list", &[])?;
        self.request_data(url, RequestOptions::get()).await
    }
}

/// Build the message listing URL; `after` is omitted entirely when `None`
pub fn message_list_url(base_url: &str, session_id: &str, after: Option<&str>) -> Result<Url> {
    let mut query = vec![("session_id", session_id)];
    if let Some(after) = after {
        query.push(("after", after));
    }
    build_url(base_url, "/message/list", &query)
}

fn build_url(base_url: &str, path: &str, query: &[(&str, &str)]) -> Result<Url> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url)
}

/// Caller headers with `Authorization` always replaced by the bearer token
fn merge_headers(caller: &HeaderMap, token: &str) -> Result<HeaderMap> {
    let mut headers = caller.clone();
    let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ClientError::TransportError("Access token is not a valid header value".to_string()))?;
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// `data` of a successful envelope; a missing or null `data` decodes as JSON null
fn unwrap_envelope<T: DeserializeOwned>(body: Value) -> Result<T> {
    let envelope: ApiResponse<Value> = decode(body)?;
    if !envelope.status {
        return Err(rejected(envelope.message));
    }
    decode(envelope.data.unwrap_or(Value::Null))
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| {
        tracing::error!(error = %e, "Unexpected response shape");
        ClientError::TransportError(e.to_string())
    })
}

fn rejected(message: Option<String>) -> ClientError {
    let message = message.unwrap_or_else(|| "Request rejected by server".to_string());
    tracing::error!(message = %message, "Server reported failure");
    ClientError::Rejected { message }
}

fn categorize(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}

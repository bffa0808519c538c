//! Remote client: the single point of entry for every outbound HTTP call.
//!
//! Agent webhooks, agent result endpoints and the session API are all reached
//! through one `reqwest::Client` so the session cookie jar is shared.
use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, Response,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::poller::JobTransport;

pub mod session;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Expected application/json, got '{0}'")]
    ContentType(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Error bodies come back as `{"message": ..}` or `{"error": ..}` depending on the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    session_base: String,
}

impl RemoteClient {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            session_base: config.session_api_url.clone(),
        })
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/{}", self.session_base, path)
    }

    /// Reads a JSON body, rejecting anything not labelled `application/json`.
    async fn read_json(response: Response) -> Result<Value, TransportError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_json_content_type(&content_type) {
            return Err(TransportError::ContentType(content_type));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Converts a non-2xx response into `TransportError::Status`, pulling the
    /// upstream message out of the body when there is one.
    async fn status_error(response: Response) -> TransportError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        TransportError::Status {
            status: status.as_u16(),
            message: error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
        }
    }
}

#[async_trait]
impl JobTransport for RemoteClient {
    async fn post_json(&self, url: &str, body: &Value) -> Result<(), TransportError> {
        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        debug!("Webhook {url} accepted submission ({})", response.status());
        Ok(())
    }

    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        Self::read_json(response).await
    }
}

/// `application/json`, optionally with parameters such as `; charset=utf-8`.
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Extracts a human-readable message from an upstream error body.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message.or(parsed.error),
        // Plain-text bodies are passed through, HTML error pages are not.
        Err(_) if !body.starts_with('<') => Some(body.to_string()),
        Err(_) => None,
    }
}

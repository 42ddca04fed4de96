//! Toy API client: form-encoded requests, JSON responses.
//!
//! Plain request/response. There is deliberately no retry or backoff.

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::ClientSettings;

pub const LOGIN_PATH: &str = "auth/local";
pub const FALLBACK_MESSAGE: &str = "there was an error";

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoginError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Login rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `None` when the body is empty or not JSON.
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// The `"message"` string of a JSON object body, if any.
    pub fn message(&self) -> Option<&str> {
        self.body.as_ref()?.get("message")?.as_str()
    }
}

// =============================================================================
// Client
// =============================================================================

pub struct ApiClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LoginError> {
        // Url::join drops the last segment unless the base ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url =
            Url::parse(&normalized).map_err(|e| LoginError::InvalidUrl(format!("{base_url}: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoginError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, LoginError> {
        Self::new(&settings.base_url, settings.timeout())
    }

    fn endpoint(&self, path: &str) -> Result<Url, LoginError> {
        self.base_url
            .join(path)
            .map_err(|e| LoginError::InvalidUrl(format!("{path}: {e}")))
    }

    fn classify(&self, err: reqwest::Error) -> LoginError {
        if err.is_timeout() {
            LoginError::Timeout(self.timeout.as_millis() as u64)
        } else {
            LoginError::Transport(err.to_string())
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, LoginError> {
        self.data_task(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiResponse, LoginError> {
        self.data_task(Method::POST, path, Some(form)).await
    }

    pub async fn put(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiResponse, LoginError> {
        self.data_task(Method::PUT, path, Some(form)).await
    }

    async fn data_task(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, &str)]>,
    ) -> Result<ApiResponse, LoginError> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "sending request");

        let mut request = self.client.request(method, url);
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        let body = serde_json::from_slice(&bytes).ok();

        debug!(status, has_json = body.is_some(), "received response");
        Ok(ApiResponse { status, body })
    }

    /// Posts the credentials to `auth/local`. Any 2xx is a successful login.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), LoginError> {
        let response = self
            .post(LOGIN_PATH, &[("email", email), ("password", password)])
            .await?;

        if response.is_success() {
            info!(email, "logged in");
            return Ok(());
        }

        Err(LoginError::Rejected {
            status: response.status,
            message: response.message().unwrap_or(FALLBACK_MESSAGE).to_string(),
        })
    }
}

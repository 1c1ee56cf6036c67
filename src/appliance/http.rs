//! HTTP utilities for appliance REST API calls

use crate::engine::ApiError;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

use super::auth::Credentials;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Status, `Location` header and parsed body of a successful call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub location: Option<String>,
    /// `Value::Null` for an empty body
    pub body: Value,
}

/// HTTP client wrapper for appliance API calls
#[derive(Clone)]
pub struct ApplianceHttpClient {
    client: Client,
}

impl ApplianceHttpClient {
    /// Create a new HTTP client
    pub fn new(verify_tls: bool, timeout: Duration) -> Result<Self> {
        if !verify_tls {
            tracing::warn!("TLS certificate verification disabled");
        }

        let client = Client::builder()
            .user_agent(concat!("polsync/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!verify_tls)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, credentials: &Credentials) -> Result<ApiResponse, ApiError> {
        tracing::debug!("GET {}", url);
        self.send(credentials.apply(self.client.get(url))).await
    }

    /// Make a POST request with a JSON body
    pub async fn post(
        &self,
        url: &str,
        credentials: &Credentials,
        body: &Value,
    ) -> Result<ApiResponse, ApiError> {
        tracing::debug!("POST {}", url);
        self.send(credentials.apply(self.client.post(url)).json(body))
            .await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(
        &self,
        url: &str,
        credentials: &Credentials,
        body: &Value,
    ) -> Result<ApiResponse, ApiError> {
        tracing::debug!("PUT {}", url);
        self.send(credentials.apply(self.client.put(url)).json(body))
            .await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, credentials: &Credentials) -> Result<ApiResponse, ApiError> {
        tracing::debug!("DELETE {}", url);
        self.send(credentials.apply(self.client.delete(url))).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<ApiResponse, ApiError> {
        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to read response body: {}", e)))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("API returned 404");
            return Err(ApiError::NotFound);
        }

        if !status.is_success() {
            // Only the sanitized body goes to the log; the caller gets the raw one
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string(),
                body,
            });
        }

        let body = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            location,
            body,
        })
    }
}

/// Format an appliance API error for display
pub fn format_appliance_error(error: &ApiError) -> String {
    match error {
        ApiError::NotFound => "Resource not found.".to_string(),
        ApiError::Status { status, .. } => match status {
            400 => "Invalid request. The appliance rejected the payload.".to_string(),
            401 => "Authentication failed. Check POLSYNC_USERNAME / POLSYNC_PASSWORD.".to_string(),
            403 => "Permission denied. The account needs ERS admin rights.".to_string(),
            409 => "Resource conflict. The resource may already exist or be in use.".to_string(),
            415 => "Unsupported media type. Is the ERS API enabled?".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            500 | 502 | 503 => "Appliance temporarily unavailable. Please try again.".to_string(),
            other => format!("Request failed with status {}.", other),
        },
        ApiError::Transport(_) => {
            "Request failed. Check your network connection and the appliance address.".to_string()
        },
        ApiError::Decode(_) => "Unexpected response from the appliance.".to_string(),
        ApiError::Request(msg) => format!("Invalid request: {}", msg),
        ApiError::Unsupported(op) => format!("Operation not supported: {}", op),
    }
}

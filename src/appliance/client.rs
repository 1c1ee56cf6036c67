//! Appliance Client
//!
//! Main client for the appliance REST APIs, combining credentials, the HTTP
//! client and the base address.

use super::auth::Credentials;
use super::http::{ApiResponse, ApplianceHttpClient};
use crate::engine::ApiError;
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Main appliance client
#[derive(Clone)]
pub struct ApplianceClient {
    pub credentials: Credentials,
    pub http: ApplianceHttpClient,
    pub base_url: Url,
}

impl ApplianceClient {
    /// Create a new appliance client
    pub fn new(base_url: &str, credentials: Credentials, verify_tls: bool) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let http = ApplianceHttpClient::new(verify_tls, DEFAULT_TIMEOUT)?;

        Ok(Self {
            credentials,
            http,
            base_url,
        })
    }

    /// Absolute URL for an API path, with optional query parameters
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Request(format!("bad path {:?}: {}", path, e)))?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<ApiResponse, ApiError> {
        self.http.get(url, &self.credentials).await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.http.post(url, &self.credentials, body).await
    }

    /// Make a PUT request
    pub async fn put(&self, url: &str, body: &Value) -> Result<ApiResponse, ApiError> {
        self.http.put(url, &self.credentials, body).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str) -> Result<ApiResponse, ApiError> {
        self.http.delete(url, &self.credentials).await
    }
}

/// Parse and normalize the appliance base address (always ends with '/')
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).with_context(|| format!("Invalid base URL {:?}", base_url))?;

    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Base URL must use http or https, got {:?}", url.scheme());
    }
    if url.host_str().is_none() {
        anyhow::bail!("Base URL {:?} has no host", base_url);
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);

    Ok(url)
}

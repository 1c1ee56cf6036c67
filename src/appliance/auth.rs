//! Appliance authentication
//!
//! The REST APIs use HTTP basic authentication. Credentials come from the
//! environment (or explicit values) and are never written to the config file.

use anyhow::{Context, Result};
use reqwest::RequestBuilder;

pub const USERNAME_ENV: &str = "POLSYNC_USERNAME";
pub const PASSWORD_ENV: &str = "POLSYNC_PASSWORD";

/// Basic-auth credentials for the appliance
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Build credentials from an optional username and the environment.
    /// The explicit username wins over `POLSYNC_USERNAME`.
    pub fn from_env(username: Option<&str>) -> Result<Self> {
        let username = match username {
            Some(u) => u.to_string(),
            None => std::env::var(USERNAME_ENV)
                .with_context(|| format!("No username given and {} is not set", USERNAME_ENV))?,
        };
        let password = std::env::var(PASSWORD_ENV)
            .with_context(|| format!("{} is not set", PASSWORD_ENV))?;

        if !validate_username(&username) {
            anyhow::bail!("Invalid username {:?}", username);
        }

        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Attach the credentials to a request
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Usernames must be non-empty and free of control characters and ':'
/// (basic auth cannot carry a ':' in the user part)
fn validate_username(username: &str) -> bool {
    !username.is_empty() && !username.chars().any(|c| c.is_control() || c == ':')
}

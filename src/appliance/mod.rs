//! Appliance API interaction module
//!
//! This module provides the transport the reconciliation engine is plugged
//! into: credentials, an HTTP client and URL building for the appliance's
//! REST APIs (the paginated ERS config API and the JSON policy API).
//!
//! # Module Structure
//!
//! - [`auth`] - Basic-auth credentials from the environment
//! - [`client`] - Main appliance client for making API requests
//! - [`http`] - HTTP utilities, status mapping and error formatting
//!
//! # Example
//!
//! ```ignore
//! use polsync::appliance::{auth::Credentials, client::ApplianceClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let creds = Credentials::from_env(None)?;
//!     let client = ApplianceClient::new("https://ise.example.com:9060", creds, true)?;
//!     let url = client.url("/ers/config/networkdevice", &[])?;
//!     let devices = client.get(&url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

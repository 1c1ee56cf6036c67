//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing appliance resources.
//! Resource definitions are loaded from JSON files at compile time, allowing
//! new resource kinds to be added without code changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`rest`] - Implements the engine's `ResourceApi` for a definition over REST
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `ers.json` - Paginated ERS config resources (network devices, endpoints, SGTs)
//! - `policy.json` - Policy API resources (policy sets and their rules)
//!
//! # Example
//!
//! ```ignore
//! use polsync::engine::ReconciledWriter;
//! use polsync::resource::{get_resource, RestResource};
//!
//! async fn apply(client: &ApplianceClient, desired: &DesiredState) -> anyhow::Result<()> {
//!     let def = get_resource("network-device").unwrap();
//!     let api = RestResource::new(client, def, Vec::new());
//!     let outcome = ReconciledWriter::new(&api, &def.kind).create(desired, &Vec::new()).await?;
//!     Ok(())
//! }
//! ```

mod registry;
mod rest;

pub use registry::*;
pub use rest::RestResource;

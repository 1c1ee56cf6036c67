//! Reconciliation core for network-policy appliance resources.
//!
//! A host configuration controller hands over a desired-state record and,
//! for existing objects, the identity string it persisted earlier. This crate
//! resolves what the appliance actually holds, decides whether to adopt,
//! create, update or delete, and hands back the identity to persist.
//!
//! - [`engine`] - Resource-kind-agnostic reconciliation logic
//! - [`resource`] - Resource kind definitions and their REST binding
//! - [`appliance`] - HTTP transport to the appliance
//! - [`config`] - Persistent user configuration

pub mod appliance;
pub mod config;
pub mod engine;
pub mod resource;

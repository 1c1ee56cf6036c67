//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads all resource kind definitions from embedded JSON files
//! and provides lookup functions for the rest of the application.

use crate::engine::ResourceKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/ers.json"),
    include_str!("../resources/policy.json"),
];

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    /// Collection path; may contain `{scope_field}` placeholders
    pub list_path: String,
    /// Single-object path; defaults to `{list_path}/{id}`
    #[serde(default)]
    pub detail_path: Option<String>,
    /// Direct lookup by secondary key, with a `{key}` placeholder
    #[serde(default)]
    pub key_lookup_path: Option<String>,
    /// Dotted path of the entry array in a list response (empty: the body itself)
    pub response_path: String,
    /// Dotted path of the "next page" link; absent for unpaginated collections
    #[serde(default)]
    pub next_path: Option<String>,
    /// Key wrapping the object in request bodies (`{"NetworkDevice": {...}}`)
    #[serde(default)]
    pub request_wrapper: Option<String>,
    /// Key wrapping the object in single-object responses
    #[serde(default)]
    pub response_wrapper: Option<String>,
    #[serde(flatten)]
    pub kind: ResourceKind,
}

impl ResourceDef {
    pub fn detail_path(&self) -> String {
        self.detail_path
            .clone()
            .unwrap_or_else(|| format!("{}/{{id}}", self.list_path.trim_end_matches('/')))
    }

    pub fn is_paginated(&self) -> bool {
        self.next_path.is_some()
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: BTreeMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        for (key, def) in final_config.resources.iter_mut() {
            def.kind.name = key.clone();
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all resource keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect()
}

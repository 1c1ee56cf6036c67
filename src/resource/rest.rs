//! REST resource binding
//!
//! Implements the engine's `ResourceApi` for one resource definition on top of
//! the appliance client: builds paths from the definition's templates,
//! unwraps list and detail responses, and follows `Location` headers after a
//! create.

use super::registry::ResourceDef;
use crate::appliance::client::ApplianceClient;
use crate::engine::api::{lookup_path, render_scalar, DEFAULT_PAGE_SIZE};
use crate::engine::{ApiError, DesiredState, Detail, Page, PageMarker, ResourceApi, Scope, Summary};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One resource kind, within one scope, on one appliance
pub struct RestResource<'a> {
    client: &'a ApplianceClient,
    def: &'a ResourceDef,
    scope: Scope,
    page_size: u32,
}

impl<'a> RestResource<'a> {
    pub fn new(client: &'a ApplianceClient, def: &'a ResourceDef, scope: Scope) -> Self {
        Self {
            client,
            def,
            scope,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fill `{placeholders}` from the scope and the extra values, URL-encoded
    fn expand(&self, template: &str, extra: &[(&str, &str)]) -> Result<String, ApiError> {
        let mut path = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                return Err(ApiError::Request(format!("unclosed placeholder in {:?}", template)));
            };
            let name = &rest[start + 1..start + len];

            let value = extra
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
                .or_else(|| {
                    self.scope
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.as_str())
                })
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::Request(format!("missing value for {{{}}}", name)))?;

            path.push_str(&rest[..start]);
            path.push_str(&urlencoding::encode(value));
            rest = &rest[start + len + 1..];
        }
        path.push_str(rest);

        Ok(path)
    }

    fn detail_url(&self, id: &str) -> Result<String, ApiError> {
        let path = self.expand(&self.def.detail_path(), &[("id", id)])?;
        self.client.url(&path, &[])
    }

    /// Single object out of a response body, unwrapping the response wrapper
    fn unwrap_detail(&self, body: Value) -> Option<Detail> {
        let body = match (&self.def.response_wrapper, body) {
            (Some(wrapper), Value::Object(mut map)) => map.remove(wrapper)?,
            (_, body) => body,
        };
        Detail::from_value(body)
    }

    /// Request body for create/update, wrapped when the API expects it
    fn wrap_request(&self, fields: Map<String, Value>) -> Value {
        match &self.def.request_wrapper {
            Some(wrapper) => {
                let mut outer = Map::new();
                outer.insert(wrapper.clone(), Value::Object(fields));
                Value::Object(outer)
            },
            None => Value::Object(fields),
        }
    }

    fn parse_page(&self, body: &Value) -> Page {
        let items = extract_items(body, &self.def.response_path);
        let schema = &self.def.kind.identity;

        let entries = items
            .into_iter()
            .filter_map(|item| {
                let map = item.as_object()?;
                let id = lookup_path(map, &schema.id_field).and_then(render_scalar)?;
                let key = lookup_path(map, &schema.key_field).and_then(render_scalar);
                Some(Summary { id, key, raw: item })
            })
            .collect();

        let next = self
            .def
            .next_path
            .as_deref()
            .and_then(|path| body.as_object().and_then(|m| lookup_path(m, path)))
            .and_then(|href| href.as_str())
            .and_then(PageMarker::from_href);

        Page { entries, next }
    }
}

/// Extract the entry array from a list response using a dotted path
fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return response.as_array().cloned().unwrap_or_default();
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}

/// Set a value at a dotted path, creating intermediate objects
fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            root.insert(path.to_string(), value);
        },
        Some((head, tail)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_path(map, tail, value);
            }
        },
    }
}

/// Last path segment of a `Location` header
fn id_from_location(location: &str) -> Option<String> {
    let path = location.split(&['?', '#'][..]).next()?;
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[async_trait]
impl ResourceApi for RestResource<'_> {
    async fn list_page(&self, marker: Option<&PageMarker>) -> Result<Page, ApiError> {
        let path = self.expand(&self.def.list_path, &[])?;

        let query = match (self.def.is_paginated(), marker) {
            (false, _) => vec![],
            (true, Some(m)) => vec![("page", m.page.to_string()), ("size", m.size.to_string())],
            (true, None) => vec![("page", "1".to_string()), ("size", self.page_size.to_string())],
        };

        let url = self.client.url(&path, &query)?;
        let response = self.client.get(&url).await?;
        Ok(self.parse_page(&response.body))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Detail>, ApiError> {
        let url = self.detail_url(id)?;
        match self.client.get(&url).await {
            Ok(response) => Ok(self.unwrap_detail(response.body)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn supports_key_lookup(&self) -> bool {
        self.def.key_lookup_path.is_some()
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<Detail>, ApiError> {
        let Some(template) = &self.def.key_lookup_path else {
            return Err(ApiError::Unsupported("get by key"));
        };
        let path = self.expand(template, &[("key", key)])?;
        let url = self.client.url(&path, &[])?;

        match self.client.get(&url).await {
            Ok(response) => Ok(self.unwrap_detail(response.body)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, desired: &DesiredState) -> Result<Detail, ApiError> {
        let path = self.expand(&self.def.list_path, &[])?;
        let url = self.client.url(&path, &[])?;
        let response = self.client.post(&url, &self.wrap_request(desired.clone())).await?;

        if let Some(detail) = self.unwrap_detail(response.body) {
            return Ok(detail);
        }

        // ERS answers 201 with an empty body and the new object's URL
        let Some(id) = response.location.as_deref().and_then(id_from_location) else {
            return Err(ApiError::Decode(
                "create response has neither a body nor a Location header".to_string(),
            ));
        };
        tracing::debug!("Created object has id {}", id);

        match self.get_by_id(&id).await? {
            Some(detail) => Ok(detail),
            None => {
                let mut fields = desired.clone();
                set_path(&mut fields, &self.def.kind.identity.id_field, Value::String(id));
                Ok(Detail::new(fields))
            },
        }
    }

    async fn update_by_id(
        &self,
        id: &str,
        desired: &DesiredState,
    ) -> Result<Option<Detail>, ApiError> {
        let url = self.detail_url(id)?;
        let mut fields = desired.clone();
        set_path(
            &mut fields,
            &self.def.kind.identity.id_field,
            Value::String(id.to_string()),
        );

        let response = self.client.put(&url, &self.wrap_request(fields)).await?;
        Ok(self.unwrap_detail(response.body))
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), ApiError> {
        let url = self.detail_url(id)?;
        self.client.delete(&url).await?;
        Ok(())
    }
}

//! Resource capability interface
//!
//! One `ResourceApi` value gives the engine list/get/create/update/delete
//! access to a single resource kind within a single scope. The engine never
//! talks HTTP itself.

use super::error::ApiError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Desired-state record handed over by the host controller
pub type DesiredState = Map<String, Value>;

/// Continuation marker of a paginated listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageMarker {
    pub page: u32,
    pub size: u32,
}

impl PageMarker {
    /// Parse the `page`/`size` query parameters out of a "next page" link.
    /// Relative links are accepted.
    pub fn from_href(href: &str) -> Option<Self> {
        let parsed = url::Url::parse(href)
            .or_else(|_| url::Url::parse("http://appliance.invalid/").and_then(|b| b.join(href)))
            .ok()?;

        let mut page = None;
        let mut size = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "page" => page = value.parse().ok(),
                "size" => size = value.parse().ok(),
                _ => {},
            }
        }

        Some(Self {
            page: page?,
            size: size.unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }
}

/// Page size used when a continuation link does not carry one
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One entry of a collection listing
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub id: String,
    /// Secondary key, when the list endpoint returns it
    pub key: Option<String>,
    pub raw: Value,
}

/// One page of a collection listing
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entries: Vec<Summary>,
    pub next: Option<PageMarker>,
}

/// Fully populated remote object, as returned by a get-by-id call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detail(Map<String, Value>);

impl Detail {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// `None` for anything that is not a non-empty JSON object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) if !map.is_empty() => Some(Self(map)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Field at a dotted path (`rule.name`, `links.0.href`)
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.0, path)
    }

    /// Field at a dotted path rendered as text; empty text counts as absent
    pub fn field_str(&self, path: &str) -> Option<String> {
        self.field(path)
            .and_then(render_scalar)
            .filter(|s| !s.is_empty())
    }
}

/// Walk a dotted path through nested objects and arrays
pub fn lookup_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = root.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(part)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Render a scalar JSON value as the text the appliance would show
pub fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Remote-access operations for one resource kind
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Fetch one page of the collection; `None` asks for the first page
    async fn list_page(&self, marker: Option<&PageMarker>) -> Result<Page, ApiError>;

    /// `Ok(None)` when the object does not exist
    async fn get_by_id(&self, id: &str) -> Result<Option<Detail>, ApiError>;

    /// Whether the kind has a direct lookup by secondary key
    fn supports_key_lookup(&self) -> bool {
        false
    }

    async fn get_by_key(&self, _key: &str) -> Result<Option<Detail>, ApiError> {
        Err(ApiError::Unsupported("get by key"))
    }

    async fn create(&self, desired: &DesiredState) -> Result<Detail, ApiError>;

    /// Acknowledges the update, with the updated object when the appliance echoes it
    async fn update_by_id(&self, id: &str, desired: &DesiredState)
        -> Result<Option<Detail>, ApiError>;

    async fn delete_by_id(&self, id: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_marker_from_absolute_href() {
        let marker =
            PageMarker::from_href("https://ise.example:9060/ers/config/networkdevice?size=20&page=3")
                .unwrap();
        assert_eq!(marker, PageMarker { page: 3, size: 20 });
    }

    #[test]
    fn test_page_marker_from_relative_href_defaults_size() {
        let marker = PageMarker::from_href("/ers/config/endpoint?page=2").unwrap();
        assert_eq!(marker.page, 2);
        assert_eq!(marker.size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_marker_requires_page() {
        assert!(PageMarker::from_href("/ers/config/endpoint?size=5").is_none());
    }

    #[test]
    fn test_detail_dotted_lookup() {
        let detail = Detail::from_value(json!({
            "rule": {"name": "Guests", "hitCounts": 4},
            "profile": ["PermitAccess"],
            "default": false
        }))
        .unwrap();

        assert_eq!(detail.field_str("rule.name").as_deref(), Some("Guests"));
        assert_eq!(detail.field_str("rule.hitCounts").as_deref(), Some("4"));
        assert_eq!(detail.field_str("profile.0").as_deref(), Some("PermitAccess"));
        assert_eq!(detail.field_str("default").as_deref(), Some("false"));
        assert!(detail.field("rule.missing").is_none());
    }

    #[test]
    fn test_detail_from_empty_object_is_none() {
        assert!(Detail::from_value(json!({})).is_none());
        assert!(Detail::from_value(Value::Null).is_none());
    }
}

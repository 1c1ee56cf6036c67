//! Composite identity
//!
//! A resource kind addresses its objects with an id, a secondary key and zero
//! or more scope fields (for example the policy set a rule lives in). Inside
//! the engine that is a typed [`CompositeIdentity`]; the host controller only
//! ever sees the encoded string.
//!
//! Wire format: `name=value` pairs joined with `&`, both sides percent-encoded.
//! Every schema field is written, empty values as `name=`.

use super::api::{DesiredState, Detail};
use super::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};

const PAIR_SEPARATOR: char = '&';
const VALUE_SEPARATOR: char = '=';

/// Field names making up the identity of one resource kind, in encoding order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySchema {
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default = "default_key_field")]
    pub key_field: String,
    #[serde(default)]
    pub scope_fields: Vec<String>,
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_key_field() -> String {
    "name".to_string()
}

impl Default for IdentitySchema {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
            key_field: default_key_field(),
            scope_fields: Vec::new(),
        }
    }
}

/// Scope values, in schema order
pub type Scope = Vec<(String, String)>;

/// Typed identity of one remote object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompositeIdentity {
    /// Appliance-assigned id; empty when unknown
    pub id: String,
    /// Secondary key (usually the name); empty when unknown
    pub key: String,
    pub scope: Scope,
}

impl CompositeIdentity {
    /// Identity as far as the desired state tells it
    pub fn from_desired(schema: &IdentitySchema, desired: &DesiredState, scope: &Scope) -> Self {
        let detail = Detail::new(desired.clone());
        Self {
            id: detail.field_str(&schema.id_field).unwrap_or_default(),
            key: detail.field_str(&schema.key_field).unwrap_or_default(),
            scope: scope.clone(),
        }
    }

    /// Identity re-derived from a remote object. The appliance's values win;
    /// local ones only fill gaps the object does not report.
    pub fn from_detail(schema: &IdentitySchema, detail: &Detail, fallback: &CompositeIdentity) -> Self {
        Self {
            id: detail
                .field_str(&schema.id_field)
                .unwrap_or_else(|| fallback.id.clone()),
            key: detail
                .field_str(&schema.key_field)
                .unwrap_or_else(|| fallback.key.clone()),
            scope: fallback.scope.clone(),
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn has_key(&self) -> bool {
        !self.key.is_empty()
    }

    pub fn scope_value(&self, name: &str) -> Option<&str> {
        self.scope
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Encode with the schema's field names, in schema order
    pub fn encode(&self, schema: &IdentitySchema) -> String {
        let mut fields: Vec<(&str, &str)> = vec![
            (schema.id_field.as_str(), self.id.as_str()),
            (schema.key_field.as_str(), self.key.as_str()),
        ];
        for name in &schema.scope_fields {
            fields.push((name.as_str(), self.scope_value(name).unwrap_or_default()));
        }
        encode_fields(fields)
    }

    /// Decode a persisted identity. Fields the string does not carry (older,
    /// narrower identities) come back empty.
    pub fn decode(schema: &IdentitySchema, encoded: &str) -> Result<Self> {
        let decoded = decode_fields(encoded)?;
        let take = |name: &str| decoded.get(name).unwrap_or_default().to_string();

        Ok(Self {
            id: take(&schema.id_field),
            key: take(&schema.key_field),
            scope: schema
                .scope_fields
                .iter()
                .map(|name| (name.clone(), take(name)))
                .collect(),
        })
    }
}

impl std::fmt::Display for CompositeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.has_id(), self.has_key()) {
            (true, true) => write!(f, "id={} key={}", self.id, self.key),
            (true, false) => write!(f, "id={}", self.id),
            (false, true) => write!(f, "key={}", self.key),
            (false, false) => write!(f, "<unidentified>"),
        }
    }
}

/// Fields of a decoded identity, in encoded order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedIdentity {
    fields: Vec<(String, String)>,
}

impl DecodedIdentity {
    /// `None` when the field was not encoded; `Some("")` when encoded empty
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Value and presence flag; absent fields read as empty
    pub fn lookup(&self, name: &str) -> (String, bool) {
        match self.get(name) {
            Some(value) => (value.to_string(), true),
            None => (String::new(), false),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Encode an ordered set of named fields into one opaque string
pub fn encode_fields<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    fields
        .into_iter()
        .map(|(name, value)| {
            format!(
                "{}{}{}",
                urlencoding::encode(name),
                VALUE_SEPARATOR,
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join(&PAIR_SEPARATOR.to_string())
}

/// Decode a string produced by [`encode_fields`]
pub fn decode_fields(encoded: &str) -> Result<DecodedIdentity> {
    let mut decoded = DecodedIdentity::default();
    if encoded.is_empty() {
        return Ok(decoded);
    }

    for segment in encoded.split(PAIR_SEPARATOR) {
        let Some((raw_name, raw_value)) = segment.split_once(VALUE_SEPARATOR) else {
            return Err(ReconcileError::malformed(
                encoded,
                format!("segment {:?} has no '{}'", segment, VALUE_SEPARATOR),
            ));
        };

        let name = percent_decode(encoded, raw_name)?;
        let value = percent_decode(encoded, raw_value)?;

        if name.is_empty() {
            return Err(ReconcileError::malformed(encoded, "empty field name"));
        }
        if decoded.get(&name).is_some() {
            return Err(ReconcileError::malformed(
                encoded,
                format!("field {:?} appears twice", name),
            ));
        }

        decoded.fields.push((name, value));
    }

    Ok(decoded)
}

fn percent_decode(encoded: &str, raw: &str) -> Result<String> {
    if !escapes_well_formed(raw) {
        return Err(ReconcileError::malformed(
            encoded,
            format!("bad percent escape in {:?}", raw),
        ));
    }
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| ReconcileError::malformed(encoded, e.to_string()))
}

/// Every '%' must be followed by two hex digits
fn escapes_well_formed(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let ok = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !ok {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

//! Field equivalence
//!
//! The appliance often reports a value in a different surface form than it was
//! configured with (`on` for `true`, a MAC without separators, a group name
//! with its tag appended). These comparators decide whether two texts denote
//! the same value, so that only real drift causes a write.
//!
//! All comparators are total: any pair of strings, empty ones included, gets
//! an answer.

use super::api::{lookup_path, render_scalar, DesiredState, Detail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Comparison rule for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Equivalence {
    #[default]
    Exact,
    BooleanSynonym,
    CaseInsensitive,
    MacAddress,
    LabeledName,
    Substring,
    /// Server-generated fields that are never drift
    Always,
}

impl Equivalence {
    pub fn is_equivalent(self, desired: &str, remote: &str) -> bool {
        match self {
            Equivalence::Exact => desired == remote,
            Equivalence::BooleanSynonym => boolean_synonym(desired, remote),
            Equivalence::CaseInsensitive => case_insensitive(desired, remote),
            Equivalence::MacAddress => mac_address(desired, remote),
            Equivalence::LabeledName => labeled_name(desired, remote),
            Equivalence::Substring => substring(desired, remote),
            Equivalence::Always => true,
        }
    }
}

fn boolean_value(s: &str) -> Option<bool> {
    match s {
        "true" | "on" => Some(true),
        "false" | "off" => Some(false),
        _ => None,
    }
}

/// `true`/`on` and `false`/`off` are interchangeable
pub fn boolean_synonym(desired: &str, remote: &str) -> bool {
    if desired == remote {
        return true;
    }
    match (boolean_value(desired), boolean_value(remote)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Equal ignoring letter case; everything else must match position by position
pub fn case_insensitive(desired: &str, remote: &str) -> bool {
    desired.len() == remote.len()
        && desired.chars().count() == remote.chars().count()
        && desired
            .chars()
            .zip(remote.chars())
            .all(|(a, b)| a == b || a.to_lowercase().eq(b.to_lowercase()))
}

/// Twelve upper-case hex digits, or `None` for anything that is not a MAC
pub fn normalize_mac(s: &str) -> Option<String> {
    let digits: String = s
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    (digits.len() == 12 && digits.chars().all(|c| c.is_ascii_hexdigit())).then_some(digits)
}

/// Same hardware address regardless of separators and case
pub fn mac_address(desired: &str, remote: &str) -> bool {
    match (normalize_mac(desired), normalize_mac(remote)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Name part of `"Name (label)"`, if the text carries a label
fn strip_label(s: &str) -> Option<&str> {
    let inner = s.strip_suffix(')')?;
    let (base, label) = inner.rsplit_once(" (")?;
    let valid = !base.is_empty() && !label.is_empty() && !label.contains(&['(', ')'][..]);
    valid.then_some(base)
}

/// A bare name matches the same name carrying a `" (label)"` suffix.
/// The name itself is compared case-sensitively.
pub fn labeled_name(desired: &str, remote: &str) -> bool {
    desired == remote || strip_label(remote) == Some(desired) || strip_label(desired) == Some(remote)
}

/// One text contains the other (long artifact file names vs canonical ids)
pub fn substring(desired: &str, remote: &str) -> bool {
    if desired.is_empty() || remote.is_empty() {
        return desired == remote;
    }
    desired.contains(remote) || remote.contains(desired)
}

/// Paths of the desired record whose value differs from the remote object
/// after equivalence normalization.
///
/// Only fields the desired record declares are compared. Objects are walked,
/// arrays and scalars are compared as leaves.
pub fn drifted_fields(
    desired: &DesiredState,
    remote: &Detail,
    rules: &BTreeMap<String, Equivalence>,
) -> Vec<String> {
    let mut drifted = Vec::new();
    for (name, value) in desired {
        walk(name, value, remote, rules, &mut drifted);
    }
    drifted
}

fn walk(
    path: &str,
    desired: &Value,
    remote: &Detail,
    rules: &BTreeMap<String, Equivalence>,
    drifted: &mut Vec<String>,
) {
    let rule = rules.get(path).copied();

    if let (None, Value::Object(children)) = (rule, desired) {
        if !children.is_empty() {
            for (name, value) in children {
                walk(&format!("{}.{}", path, name), value, remote, rules, drifted);
            }
            return;
        }
    }

    let remote_value = lookup_path(remote.fields(), path);
    if !leaf_equivalent(rule.unwrap_or_default(), desired, remote_value) {
        drifted.push(path.to_string());
    }
}

fn leaf_equivalent(rule: Equivalence, desired: &Value, remote: Option<&Value>) -> bool {
    if rule == Equivalence::Always {
        return true;
    }

    let Some(remote) = remote.filter(|v| !v.is_null()) else {
        return desired.is_null();
    };

    match (desired, remote) {
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len()
                && want
                    .iter()
                    .zip(have)
                    .all(|(w, h)| leaf_equivalent(rule, w, Some(h)))
        },
        _ => match (render_scalar(desired), render_scalar(remote)) {
            (Some(want), Some(have)) => rule.is_equivalent(&want, &have),
            _ => desired == remote,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_synonyms() {
        assert!(boolean_synonym("true", "on"));
        assert!(boolean_synonym("on", "true"));
        assert!(boolean_synonym("off", "false"));
        assert!(boolean_synonym("true", "true"));
        assert!(boolean_synonym("off", "off"));
        assert!(!boolean_synonym("true", "off"));
        assert!(!boolean_synonym("true", "false"));
        assert!(!boolean_synonym("on", "off"));
        assert!(!boolean_synonym("true", ""));
        assert!(!boolean_synonym("yes", "true"));
    }

    #[test]
    fn test_case_insensitive_keeps_whitespace() {
        assert!(case_insensitive("ENABLED", "enabled"));
        assert!(case_insensitive("Radius-Shared 2", "radius-shared 2"));
        assert!(!case_insensitive("enabled ", "ENABLED"));
        assert!(!case_insensitive(" enabled", "enabled"));
        assert!(!case_insensitive("a-b", "a_b"));
        assert!(case_insensitive("", ""));
    }

    #[test]
    fn test_mac_addresses() {
        assert!(mac_address("F8-40-3E-57-2C-75", "F8403E572C75"));
        assert!(mac_address("f8:40:3e:57:2c:75", "F840.3E57.2C75"));
        assert!(!mac_address("F8-40-3E-57-2C-75", "91-58-C8-5A-FB-B1"));
        assert!(!mac_address("", ""));
        assert!(!mac_address("F8-40-3E-57-2C", "F8-40-3E-57-2C"));
        assert!(!mac_address("G8-40-3E-57-2C-75", "G8403E572C75"));
    }

    #[test]
    fn test_labeled_names() {
        assert!(labeled_name("Auditors", "Auditors (16)"));
        assert!(labeled_name("Auditors (16)", "Auditors"));
        assert!(labeled_name("Auditors", "Auditors"));
        assert!(labeled_name("BYOD", "BYOD (15/000F)"));
        assert!(!labeled_name("Auditors", "auditors (16)"));
        assert!(!labeled_name("Auditors", "Auditors(16)"));
        assert!(!labeled_name("Auditors", "Auditors ()"));
        assert!(!labeled_name("", " (16)"));
    }

    #[test]
    fn test_substring_artifacts() {
        assert!(substring(
            "ise-patchbundle-3.1.0.518-Patch3-22042809.SPA.x86_64.tar.gz",
            "ise-patchbundle-3.1.0.518-Patch3"
        ));
        assert!(substring("Patch3", "ise-Patch3-x86_64"));
        assert!(!substring("Patch4", "ise-Patch3-x86_64"));
        assert!(substring("", ""));
        assert!(!substring("", "anything"));
    }

    #[test]
    fn test_always() {
        assert!(Equivalence::Always.is_equivalent("", "https://ise/ers/config/x/1"));
    }

    #[test]
    fn test_rule_names_deserialize() {
        let rules: BTreeMap<String, Equivalence> = serde_json::from_value(json!({
            "mac": "mac_address",
            "staticGroupAssignment": "boolean_synonym",
            "link": "always"
        }))
        .unwrap();
        assert_eq!(rules["mac"], Equivalence::MacAddress);
        assert_eq!(rules["link"], Equivalence::Always);
    }

    #[test]
    fn test_drifted_fields() {
        let desired = json!({
            "name": "core-sw-01",
            "mac": "F8-40-3E-57-2C-75",
            "enabled": "on",
            "profile": ["Auditors"],
            "tacacs": {"sharedSecret": "s3cret", "connectModeOptions": "OFF"},
            "description": null,
            "link": {"href": "local"}
        });
        let remote = Detail::from_value(json!({
            "id": "n-1",
            "name": "core-sw-01",
            "mac": "F8403E572C75",
            "enabled": true,
            "profile": ["Auditors (16)"],
            "tacacs": {"sharedSecret": "other", "connectModeOptions": "off"},
            "link": {"href": "https://ise/ers/config/networkdevice/n-1"}
        }))
        .unwrap();

        let rules: BTreeMap<String, Equivalence> = [
            ("mac".to_string(), Equivalence::MacAddress),
            ("enabled".to_string(), Equivalence::BooleanSynonym),
            ("profile".to_string(), Equivalence::LabeledName),
            ("tacacs.connectModeOptions".to_string(), Equivalence::CaseInsensitive),
            ("link".to_string(), Equivalence::Always),
        ]
        .into_iter()
        .collect();

        let drifted = drifted_fields(desired.as_object().unwrap(), &remote, &rules);
        assert_eq!(drifted, vec!["tacacs.sharedSecret".to_string()]);
    }

    #[test]
    fn test_missing_remote_field_is_drift() {
        let desired = json!({"description": "uplink"});
        let remote = Detail::from_value(json!({"id": "n-1"})).unwrap();
        let drifted = drifted_fields(desired.as_object().unwrap(), &remote, &BTreeMap::new());
        assert_eq!(drifted, vec!["description".to_string()]);
    }
}

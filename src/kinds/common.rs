//! Shapes shared by several resource kinds

use crate::resource::differ::Keyed;
use serde::{Deserialize, Serialize};

/// A key/value pair as declared and tracked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Keyed for KeyValue {
    fn key(&self) -> &str {
        &self.key
    }
}

/// A key/value pair as exchanged with the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuploKeyStringValue {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

impl From<&KeyValue> for DuploKeyStringValue {
    fn from(kv: &KeyValue) -> Self {
        Self {
            key: kv.key.clone(),
            value: kv.value.clone(),
        }
    }
}

impl From<&DuploKeyStringValue> for KeyValue {
    fn from(kv: &DuploKeyStringValue) -> Self {
        Self {
            key: kv.key.clone(),
            value: kv.value.clone(),
        }
    }
}

/// Convert a remote key/value list, treating a missing list as empty
pub fn key_values(remote: Option<&[DuploKeyStringValue]>) -> Vec<KeyValue> {
    remote
        .unwrap_or_default()
        .iter()
        .map(KeyValue::from)
        .collect()
}

/// `None` for an empty remote string
pub fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// serde default for flags that are on unless declared otherwise
pub fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_value_omitted_when_empty() {
        let body = serde_json::to_value(DuploKeyStringValue::from(&KeyValue::new("k", ""))).unwrap();
        assert_eq!(body, serde_json::json!({"Key": "k"}));
    }

    #[test]
    fn test_key_values_from_missing_list() {
        assert!(key_values(None).is_empty());
        let remote = vec![DuploKeyStringValue {
            key: "a".to_string(),
            value: "1".to_string(),
        }];
        assert_eq!(key_values(Some(&remote)), vec![KeyValue::new("a", "1")]);
    }
}

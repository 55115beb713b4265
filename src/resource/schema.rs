//! Declarative field schema
//!
//! Each resource type declares its fields in the embedded registry. Declarations
//! are validated against the schema before any remote call, defaults are filled
//! in, and the schema decides whether a change can be applied in place or needs
//! the object to be replaced.

use crate::error::{ProviderError, ProviderResult};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Placeholder written in place of sensitive values in logs and plan output
pub const REDACTED: &str = "(sensitive)";

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Int,
    Bool,
    StringList,
    StringMap,
    /// List of nested objects described by `fields`
    Block,
}

/// Who sets the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,
    Optional,
    /// Set by the server only
    Computed,
    /// Settable, filled in by the server when omitted
    OptionalComputed,
}

/// Value constraint checked at validation time
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Validation {
    Uuid,
    Length {
        min: usize,
        max: usize,
    },
    OneOf {
        values: Vec<String>,
    },
    Pattern {
        regex: String,
        #[serde(default)]
        message: Option<String>,
    },
    Range {
        min: i64,
        max: i64,
    },
}

/// Field definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub presence: Presence,
    #[serde(default)]
    pub force_new: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub validation: Vec<Validation>,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub description: String,
    /// Nested fields of a `block`
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub max_items: Option<usize>,
}

impl FieldDef {
    pub fn is_settable(&self) -> bool {
        self.presence != Presence::Computed
    }
}

/// Field-level differences between two attribute sets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    /// Settable fields whose value differs
    pub changed: Vec<String>,
    /// Subset of `changed` that cannot be updated in place
    pub force_new: Vec<String>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn requires_replacement(&self) -> bool {
        !self.force_new.is_empty()
    }
}

/// Validate declared attributes and return them with defaults applied
pub fn validate(resource_type: &str, fields: &[FieldDef], attrs: &Value) -> ProviderResult<Value> {
    validate_object(resource_type, "", fields, attrs).map(Value::Object)
}

fn validate_object(
    resource_type: &str,
    prefix: &str,
    fields: &[FieldDef],
    attrs: &Value,
) -> ProviderResult<Map<String, Value>> {
    let err = |field: &str, message: String| {
        ProviderError::validation(resource_type, format!("{}{}", prefix, field), message)
    };

    let input = match attrs {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        other => {
            return Err(err(
                "",
                format!("expected an object, got {}", type_name(other)),
            ))
        }
    };

    if let Some(unknown) = input.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
        return Err(err(unknown.as_str(), "unknown field".to_string()));
    }

    let mut out = Map::new();
    for field in fields {
        let value = input.get(&field.name).filter(|v| !v.is_null());
        match value {
            None => {
                if field.presence == Presence::Required {
                    return Err(err(field.name.as_str(), "is required".to_string()));
                }
                if let Some(default) = &field.default {
                    out.insert(field.name.clone(), default.clone());
                }
            }
            Some(_) if field.presence == Presence::Computed => {
                return Err(err(
                    field.name.as_str(),
                    "is computed by the server and cannot be set".to_string(),
                ));
            }
            Some(value) => {
                let checked = validate_value(resource_type, prefix, field, value)?;
                out.insert(field.name.clone(), checked);
            }
        }
    }

    Ok(out)
}

fn validate_value(
    resource_type: &str,
    prefix: &str,
    field: &FieldDef,
    value: &Value,
) -> ProviderResult<Value> {
    let path = format!("{}{}", prefix, field.name);
    let err = |message: String| ProviderError::validation(resource_type, path.clone(), message);
    let mismatch = |expected: &str| err(format!("expected {}, got {}", expected, type_name(value)));

    match field.kind {
        FieldKind::String => {
            let s = value.as_str().ok_or_else(|| mismatch("a string"))?;
            for rule in &field.validation {
                check_string(rule, s).map_err(&err)?;
            }
        }
        FieldKind::Int => {
            let n = value.as_i64().ok_or_else(|| mismatch("an integer"))?;
            for rule in &field.validation {
                if let Validation::Range { min, max } = rule {
                    if n < *min || n > *max {
                        return Err(err(format!("must be between {} and {}, got {}", min, max, n)));
                    }
                }
            }
        }
        FieldKind::Bool => {
            value.as_bool().ok_or_else(|| mismatch("a boolean"))?;
        }
        FieldKind::StringList => {
            let items = value.as_array().ok_or_else(|| mismatch("a list of strings"))?;
            for item in items {
                let s = item.as_str().ok_or_else(|| mismatch("a list of strings"))?;
                for rule in &field.validation {
                    check_string(rule, s).map_err(&err)?;
                }
            }
        }
        FieldKind::StringMap => {
            let map = value.as_object().ok_or_else(|| mismatch("a map of strings"))?;
            if map.values().any(|v| !v.is_string()) {
                return Err(mismatch("a map of strings"));
            }
        }
        FieldKind::Block => {
            let items = value.as_array().ok_or_else(|| mismatch("a list of blocks"))?;
            if let Some(max) = field.max_items {
                if items.len() > max {
                    return Err(err(format!("at most {} block(s) allowed, got {}", max, items.len())));
                }
            }
            let mut checked = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let nested_prefix = format!("{}[{}].", path, i);
                let obj = validate_object(resource_type, &nested_prefix, &field.fields, item)?;
                checked.push(Value::Object(obj));
            }
            return Ok(Value::Array(checked));
        }
    }

    Ok(value.clone())
}

fn check_string(rule: &Validation, s: &str) -> Result<(), String> {
    match rule {
        Validation::Uuid => uuid::Uuid::parse_str(s)
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a valid UUID", s)),
        Validation::Length { min, max } => {
            let len = s.chars().count();
            if len < *min || len > *max {
                Err(format!(
                    "length must be between {} and {}, got {}",
                    min, max, len
                ))
            } else {
                Ok(())
            }
        }
        Validation::OneOf { values } => {
            if values.iter().any(|v| v == s) {
                Ok(())
            } else {
                Err(format!("'{}' must be one of: {}", s, values.join(", ")))
            }
        }
        Validation::Pattern { regex, message } => {
            let re = Regex::new(regex).map_err(|e| format!("invalid pattern '{}': {}", regex, e))?;
            if re.is_match(s) {
                Ok(())
            } else {
                Err(message
                    .clone()
                    .unwrap_or_else(|| format!("'{}' does not match {}", s, regex)))
            }
        }
        Validation::Range { .. } => Ok(()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Compare validated declared attributes against the attributes in state.
///
/// Computed fields are ignored. An omitted optional-computed field means
/// "whatever the server has" and never counts as a change.
pub fn diff(fields: &[FieldDef], prior: &Value, desired: &Value) -> Changes {
    let mut changes = Changes::default();

    for field in fields.iter().filter(|f| f.is_settable()) {
        let wanted = desired.get(&field.name).filter(|v| !v.is_null());
        let current = prior.get(&field.name).unwrap_or(&Value::Null);

        let differs = match wanted {
            None if field.presence == Presence::OptionalComputed => false,
            None => !is_unset(current),
            Some(wanted) if field.kind == FieldKind::Block => {
                blocks_differ(&field.fields, wanted, current)
            }
            Some(wanted) => normalize(wanted) != normalize(current),
        };

        if differs {
            changes.changed.push(field.name.clone());
            if field.force_new {
                changes.force_new.push(field.name.clone());
            }
        }
    }

    changes
}

/// Item-wise block comparison, so nested optional-computed fields follow
/// the same rules as top-level ones
fn blocks_differ(fields: &[FieldDef], wanted: &Value, current: &Value) -> bool {
    let empty = Vec::new();
    let wanted = wanted.as_array().unwrap_or(&empty);
    let current = current.as_array().unwrap_or(&empty);
    wanted.len() != current.len()
        || wanted
            .iter()
            .zip(current)
            .any(|(w, c)| !diff(fields, c, w).is_empty())
}

fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Drop unset values so that omitted and empty compare equal
fn normalize(value: &Value) -> Value {
    match value {
        v if is_unset(v) => Value::Null,
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !is_unset(v))
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Copy of `attrs` with sensitive values replaced, for logs and plan output
pub fn redact(fields: &[FieldDef], attrs: &Value) -> Value {
    let Value::Object(map) = attrs else {
        return attrs.clone();
    };

    let mut out = map.clone();
    for field in fields {
        let Some(value) = out.get_mut(&field.name) else {
            continue;
        };
        if field.sensitive && !value.is_null() {
            *value = Value::String(REDACTED.to_string());
        } else if field.kind == FieldKind::Block {
            if let Value::Array(items) = value {
                for item in items.iter_mut() {
                    *item = redact(&field.fields, item);
                }
            }
        }
    }
    Value::Object(out)
}

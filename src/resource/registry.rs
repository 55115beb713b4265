//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads all DuploCloud resource definitions from embedded JSON
//! files and provides lookup functions for the engine and the CLI.

use super::schema::FieldDef;
use super::wait::WaitConfig;
use crate::error::{ProviderError, ProviderResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use std::time::Duration;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/tenant.json"),
    include_str!("../resources/plan.json"),
    include_str!("../resources/aws.json"),
    include_str!("../resources/gcp.json"),
];

/// Default delay between presence/absence polls
fn default_poll_interval_secs() -> u64 {
    5
}

/// HTTP method of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Endpoint definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointDef {
    pub method: HttpMethod,
    /// Path relative to the portal root, with `{param}` placeholders
    pub path: String,
}

impl EndpointDef {
    /// Substitute placeholders with URL-encoded parameter values
    pub fn render(&self, params: &PathParams) -> ProviderResult<String> {
        render_path(&self.path, params)
    }
}

/// Endpoints used by the generic engine
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Endpoints {
    #[serde(default)]
    pub create: Option<EndpointDef>,
    #[serde(default)]
    pub read: Option<EndpointDef>,
    #[serde(default)]
    pub update: Option<EndpointDef>,
    #[serde(default)]
    pub delete: Option<EndpointDef>,
}

/// Presence/absence wait, optionally switched by a boolean attribute
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggleWaitDef {
    #[serde(default)]
    pub toggle: Option<String>,
}

/// Status wait definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct StatusWaitDef {
    /// Dot path of the status field in the remote object
    pub status_path: String,
    pub target: String,
    pub interval_secs: u64,
    #[serde(default)]
    pub tolerated_errors: u32,
    #[serde(default)]
    pub toggle: Option<String>,
}

/// Waits performed around mutating calls
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaitsDef {
    #[serde(default)]
    pub presence: Option<ToggleWaitDef>,
    #[serde(default)]
    pub absence: Option<ToggleWaitDef>,
    #[serde(default)]
    pub status: Option<StatusWaitDef>,
}

/// Operation timeouts in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsDef {
    pub create_secs: u64,
    pub update_secs: u64,
    pub delete_secs: u64,
}

impl Default for TimeoutsDef {
    fn default() -> Self {
        Self {
            create_secs: 600,
            update_secs: 600,
            delete_secs: 600,
        }
    }
}

/// Collection-valued sub-resource owned by the resource
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDef {
    /// Declared items
    pub field: String,
    /// Natural key of an item, as placeholder name in `delete.path`
    pub key: String,
    pub list: EndpointDef,
    pub upsert: EndpointDef,
    pub delete: EndpointDef,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Names of the path parameters making up the persisted identifier
    pub id_segments: Vec<String>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub waits: WaitsDef,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub timeouts: TimeoutsDef,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub collections: Vec<CollectionDef>,
    /// Auxiliary endpoints used by type-specific hooks (lookups, sub-objects)
    #[serde(default)]
    pub extra_endpoints: HashMap<String, EndpointDef>,
}

/// Which operation a timeout or endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl ResourceDef {
    pub fn endpoint(&self, op: Operation) -> ProviderResult<&EndpointDef> {
        let endpoint = match op {
            Operation::Create => self.endpoints.create.as_ref(),
            Operation::Read => self.endpoints.read.as_ref(),
            Operation::Update => self.endpoints.update.as_ref(),
            Operation::Delete => self.endpoints.delete.as_ref(),
        };
        endpoint.ok_or_else(|| {
            ProviderError::Registry(format!(
                "{} has no {:?} endpoint",
                self.display_name, op
            ))
        })
    }

    pub fn extra_endpoint(&self, name: &str) -> ProviderResult<&EndpointDef> {
        self.extra_endpoints.get(name).ok_or_else(|| {
            ProviderError::Registry(format!(
                "{} has no '{}' endpoint",
                self.display_name, name
            ))
        })
    }

    pub fn timeout(&self, op: Operation) -> Duration {
        let secs = match op {
            Operation::Create => self.timeouts.create_secs,
            Operation::Update | Operation::Read => self.timeouts.update_secs,
            Operation::Delete => self.timeouts.delete_secs,
        };
        Duration::from_secs(secs)
    }

    /// Presence/absence wait parameters for `op`
    pub fn poll_config(&self, op: Operation) -> WaitConfig {
        WaitConfig::new(Duration::from_secs(self.poll_interval_secs), self.timeout(op))
    }

    /// Status wait parameters for `op`, if the resource has a status wait
    pub fn status_config(&self, op: Operation) -> Option<(&StatusWaitDef, WaitConfig)> {
        self.waits.status.as_ref().map(|def| {
            let config = WaitConfig::new(Duration::from_secs(def.interval_secs), self.timeout(op))
                .with_tolerated_errors(def.tolerated_errors);
            (def, config)
        })
    }

    /// Reject timing values that would make a wait spin or expire at once
    pub fn check_timing(&self) -> ProviderResult<()> {
        let t = &self.timeouts;
        let mut checks = vec![
            ("poll_interval_secs", self.poll_interval_secs),
            ("timeouts.create_secs", t.create_secs),
            ("timeouts.update_secs", t.update_secs),
            ("timeouts.delete_secs", t.delete_secs),
        ];
        if let Some(status) = &self.waits.status {
            checks.push(("waits.status.interval_secs", status.interval_secs));
        }

        match checks.into_iter().find(|(_, secs)| *secs == 0) {
            Some((name, _)) => Err(ProviderError::Registry(format!(
                "{}: {} must be greater than 0",
                self.display_name, name
            ))),
            None => Ok(()),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Named path parameters for endpoint templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair identity segment names with decoded identifier segments
    pub fn from_segments<S: AsRef<str>>(names: &[String], values: &[S]) -> Self {
        Self(
            names
                .iter()
                .zip(values)
                .map(|(n, v)| (n.clone(), v.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Substitute `{name}` placeholders with URL-encoded values
pub fn render_path(template: &str, params: &PathParams) -> ProviderResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            ProviderError::Registry(format!("unterminated placeholder in '{}'", template))
        })?;
        let name = &after[..end];
        let value = params.get(name).ok_or_else(|| {
            ProviderError::Registry(format!(
                "missing path parameter '{}' for '{}'",
                name, template
            ))
        })?;
        out.push_str(&urlencoding::encode(value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by type name
pub fn get_resource(type_name: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(type_name)
}

/// Get a resource definition, failing for unknown types
pub fn require_resource(type_name: &str) -> ProviderResult<&'static ResourceDef> {
    let def = get_resource(type_name)
        .ok_or_else(|| ProviderError::Registry(format!("unknown resource type: {}", type_name)))?;
    def.check_timing()?;
    Ok(def)
}

/// Get all resource type names, sorted
pub fn get_all_resource_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    types.sort_unstable();
    types
}

/// Extract a value from JSON using a dot-notation path (`a.b.0.c`)
pub fn extract_json_value<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(idx) => current.get(idx)?,
            Err(_) => current.get(part)?,
        };
    }
    Some(current)
}

/// Extract a status-like string from JSON using a dot-notation path
pub fn extract_status(item: &Value, path: &str) -> Option<String> {
    match extract_json_value(item, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

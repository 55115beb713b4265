//! Declaration manifest
//!
//! A YAML document listing the resources to manage:
//!
//! ```yaml
//! resources:
//!   - type: duplocloud_aws_tag
//!     name: env
//!     attributes:
//!       tenant_id: 0b1e2f3a-4c5d-4e6f-8a9b-0c1d2e3f4a5b
//!       arn: arn:aws:s3:::my-bucket
//!       key: env
//!       value: prod
//! ```

use crate::error::{ProviderError, ProviderResult};
use crate::resource::registry::require_resource;
use crate::resource::schema;
use crate::resource::state::address;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Declaration {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Value,
}

impl Declaration {
    pub fn address(&self) -> String {
        address(&self.resource_type, &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<Declaration>,
}

impl Manifest {
    pub fn parse(content: &str) -> ProviderResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| ProviderError::validation("manifest", "", e.to_string()))
    }

    pub fn load(path: &Path) -> ProviderResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::validation(
                "manifest",
                "",
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        Self::parse(&content)
    }

    /// Check every declaration against its schema.
    ///
    /// Returns the declarations with defaults applied. Fails on the first
    /// unknown type, duplicate address or schema violation.
    pub fn validate(&self) -> ProviderResult<Vec<Declaration>> {
        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(self.resources.len());

        for decl in &self.resources {
            if decl.name.trim().is_empty() {
                return Err(ProviderError::validation(
                    &decl.resource_type,
                    "name",
                    "must not be empty",
                ));
            }
            if !seen.insert(decl.address()) {
                return Err(ProviderError::validation(
                    &decl.resource_type,
                    "name",
                    format!("'{}' is declared more than once", decl.address()),
                ));
            }

            let def = require_resource(&decl.resource_type)?;
            let attributes = schema::validate(&decl.resource_type, &def.fields, &decl.attributes)?;
            validated.push(Declaration {
                attributes,
                ..decl.clone()
            });
        }

        Ok(validated)
    }
}

//! Local state
//!
//! The persisted record of every managed resource: its identifier and the
//! attributes read back after the last successful operation.

use crate::error::{ProviderError, ProviderResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const STATE_VERSION: u32 = 1;
pub const DEFAULT_STATE_FILE: &str = "duplo.state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub id: String,
    pub attributes: Value,
    pub updated_at: DateTime<Utc>,
}

impl StateEntry {
    pub fn new(resource_type: &str, name: &str, id: String, attributes: Value) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            id,
            attributes,
            updated_at: Utc::now(),
        }
    }

    /// Address used in plans and logs
    pub fn address(&self) -> String {
        address(&self.resource_type, &self.name)
    }
}

pub fn address(resource_type: &str, name: &str) -> String {
    format!("{}.{}", resource_type, name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Random id fixed when the state is first created
    pub lineage: String,
    /// Incremented on every save
    pub serial: u64,
    #[serde(default)]
    pub resources: Vec<StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            lineage: uuid::Uuid::new_v4().to_string(),
            serial: 0,
            resources: Vec::new(),
        }
    }
}

impl StateFile {
    /// Load state from `path`. A missing file is an empty state.
    pub fn load(path: &Path) -> ProviderResult<Self> {
        if !path.exists() {
            tracing::debug!("no state at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::state(format!("cannot read {}: {}", path.display(), e))
        })?;
        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            ProviderError::state(format!("cannot parse {}: {}", path.display(), e))
        })?;

        if state.version != STATE_VERSION {
            return Err(ProviderError::state(format!(
                "{}: unsupported state version {} (expected {})",
                path.display(),
                state.version,
                STATE_VERSION
            )));
        }
        Ok(state)
    }

    /// Write state to `path`, replacing the previous file atomically
    pub fn save(&mut self, path: &Path) -> ProviderResult<()> {
        self.serial += 1;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ProviderError::state(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ProviderError::state(format!("cannot serialize state: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| ProviderError::state(format!("cannot write {}: {}", path.display(), e)))?;

        tracing::debug!("saved state serial {} to {}", self.serial, path.display());
        Ok(())
    }

    pub fn find(&self, resource_type: &str, name: &str) -> Option<&StateEntry> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Insert or replace the entry with the same type and name
    pub fn upsert(&mut self, entry: StateEntry) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == entry.resource_type && r.name == entry.name)
        {
            Some(existing) => *existing = entry,
            None => self.resources.push(entry),
        }
    }

    pub fn remove(&mut self, resource_type: &str, name: &str) -> Option<StateEntry> {
        let idx = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("none.json")).unwrap();
        assert!(state.resources.is_empty());
        assert_eq!(state.serial, 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = StateFile::default();
        state.upsert(StateEntry::new(
            "duplocloud_aws_tag",
            "env",
            "t1/arn/env".to_string(),
            json!({"value": "prod"}),
        ));
        state.save(&path).unwrap();
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.serial, 2);
        assert_eq!(loaded.lineage, state.lineage);
        let entry = loaded.find("duplocloud_aws_tag", "env").unwrap();
        assert_eq!(entry.id, "t1/arn/env");
        assert_eq!(entry.address(), "duplocloud_aws_tag.env");
    }

    #[test]
    fn test_upsert_replaces_and_remove() {
        let mut state = StateFile::default();
        state.upsert(StateEntry::new("t", "a", "1".to_string(), json!({})));
        state.upsert(StateEntry::new("t", "a", "2".to_string(), json!({})));
        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.find("t", "a").unwrap().id, "2");

        assert!(state.remove("t", "a").is_some());
        assert!(state.remove("t", "a").is_none());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "lineage": "x", "serial": 1, "resources": []}"#,
        )
        .unwrap();
        assert!(matches!(
            StateFile::load(&path),
            Err(ProviderError::State { .. })
        ));
    }
}

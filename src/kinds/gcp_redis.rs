//! duplocloud_gcp_redis_instance
//!
//! Instances are addressed by their full name, which the portal derives from
//! the tenant name: `duploservices-{tenant}-{name}`. The persisted identifier
//! keeps the short name, so every call resolves the tenant first.

use super::common::default_true;
use super::tenant::DuploTenant;
use crate::error::{ProviderError, ProviderResult};
use crate::resource::engine::{Context, ResourceKind};
use crate::resource::registry::PathParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TIER_BASIC: &str = "BASIC";
pub const TIER_STANDARD_HA: &str = "STANDARD_HA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisInstance {
    pub tenant_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    pub memory_size_gb: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_replicas_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_configs: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_version: Option<String>,
    #[serde(default)]
    pub replica_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transit_encryption_enabled: Option<bool>,
    pub tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default = "default_true")]
    pub wait_until_ready: bool,
}

impl Default for RedisInstance {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            name: String::new(),
            fullname: None,
            memory_size_gb: 0,
            display_name: None,
            read_replicas_enabled: None,
            redis_configs: None,
            redis_version: None,
            replica_count: 0,
            auth_enabled: None,
            transit_encryption_enabled: None,
            tier: TIER_BASIC.to_string(),
            labels: None,
            wait_until_ready: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploRedisInstance {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub read_replicas_enabled: bool,
    #[serde(default)]
    pub redis_version: String,
    #[serde(default)]
    pub redis_configs: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub replica_count: i64,
    #[serde(default)]
    pub memory_size_gb: i64,
    #[serde(default)]
    pub auth_enabled: bool,
    #[serde(default)]
    pub transit_encryption_enabled: bool,
    #[serde(default)]
    pub tier: i64,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

pub fn tier_to_remote(tier: &str) -> i64 {
    if tier == TIER_STANDARD_HA {
        1
    } else {
        0
    }
}

pub fn tier_from_remote(tier: i64) -> String {
    if tier == 1 {
        TIER_STANDARD_HA.to_string()
    } else {
        TIER_BASIC.to_string()
    }
}

/// Full instance name for a tenant
pub fn full_name(account_name: &str, name: &str) -> String {
    format!("duploservices-{}-{}", account_name, name)
}

pub struct RedisInstanceKind;

#[async_trait]
impl ResourceKind for RedisInstanceKind {
    type Local = RedisInstance;
    type Remote = DuploRedisInstance;

    const TYPE_NAME: &'static str = "duplocloud_gcp_redis_instance";

    fn identity(local: &RedisInstance) -> Vec<String> {
        vec![local.tenant_id.clone(), local.name.clone()]
    }

    fn expand(local: &RedisInstance) -> DuploRedisInstance {
        DuploRedisInstance {
            name: local.name.clone(),
            display_name: local.display_name.clone().unwrap_or_default(),
            read_replicas_enabled: local.read_replicas_enabled.unwrap_or_default(),
            redis_version: local.redis_version.clone().unwrap_or_default(),
            redis_configs: local.redis_configs.clone(),
            replica_count: local.replica_count,
            memory_size_gb: local.memory_size_gb,
            auth_enabled: local.auth_enabled.unwrap_or_default(),
            transit_encryption_enabled: local.transit_encryption_enabled.unwrap_or_default(),
            tier: tier_to_remote(&local.tier),
            labels: local.labels.clone(),
            status: None,
        }
    }

    fn flatten(remote: &DuploRedisInstance, prior: &RedisInstance, id: &[String]) -> RedisInstance {
        RedisInstance {
            tenant_id: id.first().cloned().unwrap_or_else(|| prior.tenant_id.clone()),
            name: id.get(1).cloned().unwrap_or_else(|| prior.name.clone()),
            fullname: Some(remote.name.clone()),
            memory_size_gb: remote.memory_size_gb,
            display_name: Some(remote.display_name.clone()),
            read_replicas_enabled: Some(remote.read_replicas_enabled),
            redis_configs: remote.redis_configs.clone(),
            redis_version: Some(remote.redis_version.clone()),
            replica_count: remote.replica_count,
            auth_enabled: Some(remote.auth_enabled),
            transit_encryption_enabled: Some(remote.transit_encryption_enabled),
            tier: tier_from_remote(remote.tier),
            labels: remote.labels.clone(),
            wait_until_ready: prior.wait_until_ready,
        }
    }

    fn validate(&self, local: &RedisInstance) -> ProviderResult<()> {
        let invalid = |msg: &str| {
            Err(ProviderError::validation(Self::TYPE_NAME, "replica_count", msg))
        };
        match local.tier.as_str() {
            TIER_BASIC if local.replica_count != 0 => {
                invalid("invalid replica_count for 'BASIC' tier: must be 0")
            }
            TIER_STANDARD_HA if !(1..=5).contains(&local.replica_count) => {
                invalid("invalid replica_count for 'STANDARD_HA' tier: must be between 1 and 5")
            }
            TIER_BASIC | TIER_STANDARD_HA => Ok(()),
            _ => Err(ProviderError::validation(
                Self::TYPE_NAME,
                "tier",
                "unknown tier: must be 'BASIC' or 'STANDARD_HA'",
            )),
        }
    }

    async fn params(&self, ctx: &Context<'_>, id: &[String]) -> ProviderResult<PathParams> {
        let params = PathParams::from_segments(&ctx.def.id_segments, id);
        let tenant: Option<DuploTenant> = ctx
            .fetch(ctx.def.extra_endpoint("tenant")?, &params)
            .await
            .map_err(|e| e.with_context("error fetching tenant prefix"))?;
        let Some(tenant) = tenant else {
            return Err(ProviderError::NotFound {
                url: params.get("tenant_id").unwrap_or_default().to_string(),
                message: "tenant not found".to_string(),
            });
        };

        let name = params.get("name").unwrap_or_default();
        let fullname = full_name(&tenant.account_name, name);
        Ok(params.with("fullname", fullname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(tier: &str, replicas: i64) -> RedisInstance {
        RedisInstance {
            tenant_id: "t1".to_string(),
            name: "cache".to_string(),
            memory_size_gb: 1,
            tier: tier.to_string(),
            replica_count: replicas,
            ..Default::default()
        }
    }

    #[test]
    fn test_replica_count_rules() {
        let kind = RedisInstanceKind;
        assert!(kind.validate(&instance(TIER_BASIC, 0)).is_ok());
        assert!(kind.validate(&instance(TIER_BASIC, 1)).is_err());
        assert!(kind.validate(&instance(TIER_STANDARD_HA, 0)).is_err());
        assert!(kind.validate(&instance(TIER_STANDARD_HA, 1)).is_ok());
        assert!(kind.validate(&instance(TIER_STANDARD_HA, 5)).is_ok());
        assert!(kind.validate(&instance(TIER_STANDARD_HA, 6)).is_err());
        assert!(kind.validate(&instance("PREMIUM", 0)).is_err());
    }

    #[test]
    fn test_tier_mapping() {
        assert_eq!(tier_to_remote(TIER_BASIC), 0);
        assert_eq!(tier_to_remote(TIER_STANDARD_HA), 1);
        assert_eq!(tier_from_remote(1), TIER_STANDARD_HA);
        assert_eq!(tier_from_remote(0), TIER_BASIC);
    }

    #[test]
    fn test_expand_uses_short_name_and_numeric_tier() {
        let body = serde_json::to_value(RedisInstanceKind::expand(&instance(TIER_STANDARD_HA, 2)))
            .unwrap();
        assert_eq!(body["Name"], "cache");
        assert_eq!(body["Tier"], 1);
        assert_eq!(body["ReplicaCount"], 2);
        assert!(body.get("Status").is_none());
    }

    #[test]
    fn test_flatten_sets_fullname_and_keeps_wait_flag() {
        let remote: DuploRedisInstance = serde_json::from_value(serde_json::json!({
            "Name": "duploservices-dev01-cache",
            "MemorySizeGb": 4,
            "Tier": 1,
            "ReplicaCount": 2,
            "RedisVersion": "REDIS_6_X",
            "Status": "READY"
        }))
        .unwrap();
        let prior = RedisInstance {
            wait_until_ready: false,
            ..Default::default()
        };
        let id = vec!["t1".to_string(), "cache".to_string()];
        let local = RedisInstanceKind::flatten(&remote, &prior, &id);
        assert_eq!(local.fullname.as_deref(), Some("duploservices-dev01-cache"));
        assert_eq!(local.name, "cache");
        assert_eq!(local.tier, TIER_STANDARD_HA);
        assert_eq!(local.memory_size_gb, 4);
        assert!(!local.wait_until_ready);
    }

    #[test]
    fn test_full_name() {
        assert_eq!(full_name("dev01", "cache"), "duploservices-dev01-cache");
    }
}

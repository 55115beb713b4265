//! duplocloud_tenant
//!
//! Tenants are created by name; the server assigns the GUID, which is found
//! afterwards by polling the tenant list. Nothing can be changed in place.
//! Deletion only happens when `allow_deletion` is set.

use super::common::{default_true, key_values, non_empty, DuploKeyStringValue, KeyValue};
use crate::error::{ProviderError, ProviderResult};
use crate::resource::engine::{to_attrs, Context, ResourceKind};
use crate::resource::registry::{Operation, PathParams};
use crate::resource::wait;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_NAME_LENGTH: usize = 12;
const MIN_NAME_LENGTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub account_name: String,
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_k8s_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_owner: Option<String>,
    #[serde(default)]
    pub policy: Vec<TenantPolicy>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
    #[serde(default)]
    pub allow_deletion: bool,
    #[serde(default = "default_true")]
    pub wait_until_created: bool,
    #[serde(default)]
    pub wait_until_deleted: bool,
}

impl Default for Tenant {
    fn default() -> Self {
        Self {
            account_name: String::new(),
            plan_id: String::new(),
            existing_k8s_namespace: None,
            tenant_id: None,
            infra_owner: None,
            policy: Vec::new(),
            tags: Vec::new(),
            allow_deletion: false,
            wait_until_created: true,
            wait_until_deleted: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantPolicy {
    pub allow_volume_mapping: bool,
    pub block_external_ep: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploTenant {
    #[serde(rename = "TenantId", alias = "TenantID", default, skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,
    #[serde(rename = "AccountName")]
    pub account_name: String,
    #[serde(rename = "PlanID", default)]
    pub plan_id: String,
    #[serde(rename = "ExistingK8sNamespace", default, skip_serializing_if = "String::is_empty")]
    pub existing_k8s_namespace: String,
    #[serde(rename = "InfraOwner", default, skip_serializing_if = "String::is_empty")]
    pub infra_owner: String,
    #[serde(rename = "TenantPolicy", default, skip_serializing_if = "Option::is_none")]
    pub tenant_policy: Option<DuploTenantPolicy>,
    #[serde(rename = "Tags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<DuploKeyStringValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploTenantPolicy {
    #[serde(rename = "AllowVolumeMapping", default)]
    pub allow_volume_mapping: bool,
    #[serde(rename = "BlockExternalEp", default)]
    pub block_external_ep: bool,
}

/// Subset of the system feature flags
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemFeatures {
    #[serde(rename = "TenantNameMaxLength", default)]
    pub tenant_name_max_length: usize,
}

/// Check the tenant name length against the allowed maximum
pub fn check_account_name(name: &str, max_length: usize) -> ProviderResult<()> {
    let len = name.chars().count();
    if len < MIN_NAME_LENGTH || len > max_length {
        return Err(ProviderError::validation(
            TenantKind::TYPE_NAME,
            "account_name",
            format!(
                "length must be between {} and {} inclusive, got: {}",
                MIN_NAME_LENGTH, max_length, len
            ),
        ));
    }
    Ok(())
}

pub struct TenantKind;

impl TenantKind {
    /// Allowed name length; the system features can only raise the default
    async fn max_name_length(ctx: &Context<'_>) -> usize {
        let features = match ctx.def.extra_endpoint("features") {
            Ok(endpoint) => ctx.fetch::<SystemFeatures>(endpoint, &PathParams::new()).await,
            Err(e) => Err(e),
        };
        match features {
            Ok(Some(f)) if f.tenant_name_max_length > DEFAULT_MAX_NAME_LENGTH => f.tenant_name_max_length,
            Ok(_) => DEFAULT_MAX_NAME_LENGTH,
            Err(e) => {
                tracing::debug!("system features unavailable, using default name length: {}", e);
                DEFAULT_MAX_NAME_LENGTH
            }
        }
    }

    async fn find_by_name(ctx: &Context<'_>, name: &str) -> ProviderResult<Option<DuploTenant>> {
        let list = ctx.def.extra_endpoint("list")?;
        let tenants: Vec<DuploTenant> = ctx
            .fetch(list, &PathParams::new())
            .await?
            .unwrap_or_default();
        Ok(tenants.into_iter().find(|t| t.account_name == name))
    }
}

#[async_trait]
impl ResourceKind for TenantKind {
    type Local = Tenant;
    type Remote = DuploTenant;

    const TYPE_NAME: &'static str = "duplocloud_tenant";

    fn identity(local: &Tenant) -> Vec<String> {
        vec![local.tenant_id.clone().unwrap_or_default()]
    }

    fn expand(local: &Tenant) -> DuploTenant {
        DuploTenant {
            account_name: local.account_name.clone(),
            plan_id: local.plan_id.clone(),
            existing_k8s_namespace: local.existing_k8s_namespace.clone().unwrap_or_default(),
            ..Default::default()
        }
    }

    fn flatten(remote: &DuploTenant, prior: &Tenant, id: &[String]) -> Tenant {
        let tenant_id = id
            .first()
            .cloned()
            .or_else(|| non_empty(&remote.tenant_id));
        Tenant {
            account_name: remote.account_name.clone(),
            plan_id: remote.plan_id.clone(),
            existing_k8s_namespace: non_empty(&remote.existing_k8s_namespace),
            tenant_id,
            infra_owner: non_empty(&remote.infra_owner),
            policy: remote
                .tenant_policy
                .iter()
                .map(|p| TenantPolicy {
                    allow_volume_mapping: p.allow_volume_mapping,
                    block_external_ep: p.block_external_ep,
                })
                .collect(),
            tags: key_values(remote.tags.as_deref()),
            allow_deletion: prior.allow_deletion,
            wait_until_created: prior.wait_until_created,
            wait_until_deleted: prior.wait_until_deleted,
        }
    }

    async fn create_remote(&self, ctx: &Context<'_>, local: &Tenant) -> ProviderResult<Vec<String>> {
        let max = Self::max_name_length(ctx).await;
        check_account_name(&local.account_name, max)?;

        let body = to_attrs(Self::TYPE_NAME, &Self::expand(local))?;
        ctx.call(Operation::Create, &PathParams::new(), Some(&body))
            .await?;

        // the create response does not carry the id
        let found = wait::wait_until_present(
            "tenant",
            &local.account_name,
            &ctx.def.poll_config(Operation::Create),
            ctx.cancel,
            || Self::find_by_name(ctx, &local.account_name),
        )
        .await?;

        if found.tenant_id.is_empty() {
            return Err(ProviderError::upstream(
                format!("tenant '{}' has no id", local.account_name),
                "",
                "the tenant list returned an entry without TenantId",
            ));
        }
        tracing::info!("tenant '{}' has id {}", local.account_name, found.tenant_id);
        Ok(vec![found.tenant_id])
    }

    async fn update_remote(
        &self,
        _ctx: &Context<'_>,
        params: &PathParams,
        _prior: &Tenant,
        _desired: &Tenant,
    ) -> ProviderResult<()> {
        tracing::debug!(
            "tenant '{}': only local flags changed",
            params.get("tenant_id").unwrap_or_default()
        );
        Ok(())
    }

    async fn delete_remote(
        &self,
        ctx: &Context<'_>,
        params: &PathParams,
        local: &Tenant,
    ) -> ProviderResult<bool> {
        if !local.allow_deletion {
            tracing::warn!(
                "will NOT delete tenant '{}' because allow_deletion is false",
                params.get("tenant_id").unwrap_or_default()
            );
            return Ok(false);
        }
        ctx.call(Operation::Delete, params, None).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote() -> DuploTenant {
        serde_json::from_value(json!({
            "TenantId": "7a1e1d5c-0000-4000-8000-000000000001",
            "AccountName": "dev01",
            "PlanID": "default",
            "InfraOwner": "default",
            "TenantPolicy": {"AllowVolumeMapping": true, "BlockExternalEp": false},
            "Tags": [{"Key": "team", "Value": "core"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_expand_omits_server_fields() {
        let local = Tenant {
            account_name: "dev01".to_string(),
            plan_id: "default".to_string(),
            ..Default::default()
        };
        let body = serde_json::to_value(TenantKind::expand(&local)).unwrap();
        assert_eq!(body, json!({"AccountName": "dev01", "PlanID": "default"}));
    }

    #[test]
    fn test_flatten_maps_remote_and_keeps_flags() {
        let prior = Tenant {
            allow_deletion: true,
            wait_until_created: false,
            ..Default::default()
        };
        let id = vec!["7a1e1d5c-0000-4000-8000-000000000001".to_string()];
        let local = TenantKind::flatten(&remote(), &prior, &id);

        assert_eq!(local.account_name, "dev01");
        assert_eq!(local.tenant_id.as_deref(), Some(id[0].as_str()));
        assert_eq!(local.infra_owner.as_deref(), Some("default"));
        assert_eq!(local.existing_k8s_namespace, None);
        assert_eq!(
            local.policy,
            vec![TenantPolicy {
                allow_volume_mapping: true,
                block_external_ep: false
            }]
        );
        assert_eq!(local.tags, vec![KeyValue::new("team", "core")]);
        assert!(local.allow_deletion);
        assert!(!local.wait_until_created);
    }

    #[test]
    fn test_legacy_id_field_alias() {
        let t: DuploTenant =
            serde_json::from_value(json!({"TenantID": "abc", "AccountName": "x"})).unwrap();
        assert_eq!(t.tenant_id, "abc");
    }

    #[test]
    fn test_check_account_name_bounds() {
        assert!(check_account_name("a", 12).is_err());
        assert!(check_account_name("ab", 12).is_ok());
        assert!(check_account_name("abcdefghijkl", 12).is_ok());
        assert!(check_account_name("abcdefghijklm", 12).is_err());
        assert!(check_account_name("abcdefghijklm", 20).is_ok());
    }

    #[test]
    fn test_default_waits_for_creation() {
        let t: Tenant =
            serde_json::from_value(json!({"account_name": "x", "plan_id": "p"})).unwrap();
        assert!(t.wait_until_created);
        assert!(!t.allow_deletion);
        assert!(TenantKind::identity(&t)[0].is_empty());
    }
}

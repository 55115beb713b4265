//! duplocloud_plan_settings
//!
//! Three remote objects behind one resource: the plan settings record, the
//! plan DNS config and the plan metadata collection. A DNS config reported as
//! global means the plan has none of its own.

use super::common::{non_empty, DuploKeyStringValue, KeyValue};
use crate::error::{ProviderError, ProviderResult};
use crate::resource::collection::CollectionApi;
use crate::resource::differ::{duplicate_key, reconcile, select, Strategy};
use crate::resource::engine::{to_attrs, Context, ResourceKind};
use crate::resource::registry::{Operation, PathParams};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSettings {
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unrestricted_ext_lb: Option<bool>,
    #[serde(default)]
    pub dns_setting: Vec<DnsSetting>,
    #[serde(default)]
    pub metadata: Vec<KeyValue>,
    #[serde(default)]
    pub all_metadata: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified_metadata: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_dns_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_dns_suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_global_dns: Option<bool>,
}

/// Plan settings record. Unknown settings are sent back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploPlanSettings {
    #[serde(rename = "UnrestrictedExtLB", default)]
    pub unrestricted_ext_lb: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploPlanDnsConfig {
    #[serde(rename = "DomainId", default)]
    pub domain_id: String,
    #[serde(rename = "InternalDnsSuffix", default)]
    pub internal_dns_suffix: String,
    #[serde(rename = "ExternalDnsSuffix", default)]
    pub external_dns_suffix: String,
    #[serde(rename = "IgnoreGlobalDNS", default)]
    pub ignore_global_dns: bool,
    #[serde(rename = "IsGlobalDNS", default, skip_serializing)]
    pub is_global_dns: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSettingsRemote {
    pub settings: DuploPlanSettings,
    pub dns: Option<DuploPlanDnsConfig>,
    pub metadata: Vec<DuploKeyStringValue>,
}

fn expand_dns(dns: &DnsSetting) -> DuploPlanDnsConfig {
    DuploPlanDnsConfig {
        domain_id: dns.domain_id.clone().unwrap_or_default(),
        internal_dns_suffix: dns.internal_dns_suffix.clone().unwrap_or_default(),
        external_dns_suffix: dns.external_dns_suffix.clone().unwrap_or_default(),
        ignore_global_dns: dns.ignore_global_dns.unwrap_or_default(),
        is_global_dns: false,
    }
}

fn flatten_dns(dns: &DuploPlanDnsConfig) -> DnsSetting {
    DnsSetting {
        domain_id: non_empty(&dns.domain_id),
        internal_dns_suffix: non_empty(&dns.internal_dns_suffix),
        external_dns_suffix: non_empty(&dns.external_dns_suffix),
        ignore_global_dns: Some(dns.ignore_global_dns),
    }
}

pub struct PlanSettingsKind;

impl PlanSettingsKind {
    async fn metadata(api: &CollectionApi<'_>) -> ProviderResult<Vec<KeyValue>> {
        let remote: Vec<DuploKeyStringValue> = api.list().await?;
        Ok(remote.iter().map(KeyValue::from).collect())
    }

    /// Converge the managed metadata keys to `desired`
    async fn change_metadata(
        ctx: &Context<'_>,
        params: &PathParams,
        prior_specified: Option<&[String]>,
        desired: Vec<KeyValue>,
    ) -> ProviderResult<()> {
        let api = CollectionApi::new(*ctx, params.clone())?;
        let all = Self::metadata(&api).await?;
        let reconciliation = reconcile(&all, prior_specified, desired);
        let changes = reconciliation.changes(&all, Strategy::Incremental);
        api.apply(&changes, |kv: &KeyValue| DuploKeyStringValue::from(kv))
            .await
    }

    async fn write(
        ctx: &Context<'_>,
        params: &PathParams,
        prior: &PlanSettings,
        desired: &PlanSettings,
    ) -> ProviderResult<()> {
        if let Some(flag) = desired.unrestricted_ext_lb {
            if prior.unrestricted_ext_lb != Some(flag) {
                let settings = DuploPlanSettings {
                    unrestricted_ext_lb: flag,
                    ..Default::default()
                };
                let body = to_attrs(Self::TYPE_NAME, &settings)?;
                ctx.call(Operation::Update, params, Some(&body))
                    .await
                    .map_err(|e| e.with_context("failed to apply plan settings"))?;
            }
        }

        if let Some(dns) = desired.dns_setting.first() {
            let body = to_attrs(Self::TYPE_NAME, &expand_dns(dns))?;
            ctx.call_endpoint(ctx.def.extra_endpoint("dns_update")?, params, Some(&body))
                .await
                .map_err(|e| e.with_context("failed to apply plan DNS config"))?;
        }

        Self::change_metadata(
            ctx,
            params,
            prior.specified_metadata.as_deref(),
            desired.metadata.clone(),
        )
        .await
        .map_err(|e| e.with_context("failed to apply plan metadata"))
    }
}

#[async_trait]
impl ResourceKind for PlanSettingsKind {
    type Local = PlanSettings;
    type Remote = PlanSettingsRemote;

    const TYPE_NAME: &'static str = "duplocloud_plan_settings";

    fn identity(local: &PlanSettings) -> Vec<String> {
        vec![local.plan_id.clone()]
    }

    fn expand(local: &PlanSettings) -> PlanSettingsRemote {
        PlanSettingsRemote {
            settings: DuploPlanSettings {
                unrestricted_ext_lb: local.unrestricted_ext_lb.unwrap_or_default(),
                ..Default::default()
            },
            dns: local.dns_setting.first().map(expand_dns),
            metadata: local.metadata.iter().map(DuploKeyStringValue::from).collect(),
        }
    }

    /// Managed metadata keys are the recorded ones, or the declared ones
    /// right after a write.
    fn flatten(remote: &PlanSettingsRemote, prior: &PlanSettings, id: &[String]) -> PlanSettings {
        let all: Vec<KeyValue> = remote.metadata.iter().map(KeyValue::from).collect();
        let specified = prior
            .specified_metadata
            .clone()
            .unwrap_or_else(|| prior.metadata.iter().map(|m| m.key.clone()).collect());

        PlanSettings {
            plan_id: id.first().cloned().unwrap_or_else(|| prior.plan_id.clone()),
            unrestricted_ext_lb: Some(remote.settings.unrestricted_ext_lb),
            dns_setting: remote.dns.iter().map(flatten_dns).collect(),
            metadata: select(&all, &specified),
            all_metadata: all,
            specified_metadata: Some(specified),
        }
    }

    fn validate(&self, local: &PlanSettings) -> ProviderResult<()> {
        if let Some(key) = duplicate_key(&local.metadata) {
            return Err(ProviderError::validation(
                Self::TYPE_NAME,
                "metadata",
                format!("duplicate key '{}'", key),
            ));
        }
        Ok(())
    }

    async fn create_remote(
        &self,
        ctx: &Context<'_>,
        local: &PlanSettings,
    ) -> ProviderResult<Vec<String>> {
        let id = Self::identity(local);
        let params = self.params(ctx, &id).await?;
        Self::write(ctx, &params, &PlanSettings::default(), local).await?;
        Ok(id)
    }

    async fn fetch_remote(
        &self,
        ctx: &Context<'_>,
        params: &PathParams,
    ) -> ProviderResult<Option<PlanSettingsRemote>> {
        let settings: Option<DuploPlanSettings> =
            ctx.fetch(ctx.def.endpoint(Operation::Read)?, params).await?;
        let Some(settings) = settings else {
            return Ok(None);
        };

        let dns = match ctx
            .fetch::<DuploPlanDnsConfig>(ctx.def.extra_endpoint("dns_read")?, params)
            .await
        {
            Ok(dns) => dns,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.with_context("failed to retrieve plan DNS config")),
        };

        let api = CollectionApi::new(*ctx, params.clone())?;
        let metadata: Vec<DuploKeyStringValue> = api
            .list()
            .await
            .map_err(|e| e.with_context("failed to retrieve plan metadata"))?;

        Ok(Some(PlanSettingsRemote {
            settings,
            dns: dns.filter(|d| !d.is_global_dns),
            metadata,
        }))
    }

    async fn update_remote(
        &self,
        ctx: &Context<'_>,
        params: &PathParams,
        prior: &PlanSettings,
        desired: &PlanSettings,
    ) -> ProviderResult<()> {
        Self::write(ctx, params, prior, desired).await
    }

    /// Undo what this resource manages: the load balancer flag, the plan DNS
    /// config and the managed metadata keys
    async fn delete_remote(
        &self,
        ctx: &Context<'_>,
        params: &PathParams,
        local: &PlanSettings,
    ) -> ProviderResult<bool> {
        let settings: Option<DuploPlanSettings> =
            match ctx.fetch(ctx.def.endpoint(Operation::Read)?, params).await {
                Err(e) if e.is_not_found() => None,
                other => other?,
            };
        let Some(mut settings) = settings else {
            tracing::debug!("plan '{}' is gone", params.get("plan_id").unwrap_or_default());
            return Ok(false);
        };

        if local.unrestricted_ext_lb == Some(true) {
            settings.unrestricted_ext_lb = false;
            let body = to_attrs(Self::TYPE_NAME, &settings)?;
            ctx.call(Operation::Update, params, Some(&body))
                .await
                .map_err(|e| e.with_context("failed to remove plan settings"))?;
        }

        if !local.dns_setting.is_empty() {
            match ctx
                .call_endpoint(ctx.def.extra_endpoint("dns_delete")?, params, None)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.with_context("failed to remove plan DNS config")),
            }
        }

        if !local.metadata.is_empty() || local.specified_metadata.is_some() {
            Self::change_metadata(ctx, params, local.specified_metadata.as_deref(), Vec::new())
                .await
                .map_err(|e| e.with_context("failed to remove plan metadata"))?;
        }

        Ok(true)
    }
}

//! duplocloud_tenant_config
//!
//! Tenant settings stored as tenant metadata. Only declared keys are managed
//! unless `delete_unspecified_settings` asks for the full set.

use super::common::{DuploKeyStringValue, KeyValue};
use crate::resource::collection::CollectionKind;
use crate::resource::differ::{select, Strategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    #[serde(default)]
    pub setting: Vec<KeyValue>,
    #[serde(default)]
    pub delete_unspecified_settings: bool,
    #[serde(default)]
    pub metadata: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified_settings: Option<Vec<String>>,
}

pub struct TenantConfigKind;

impl CollectionKind for TenantConfigKind {
    type Local = TenantConfig;
    type Item = KeyValue;
    type RemoteItem = DuploKeyStringValue;

    const TYPE_NAME: &'static str = "duplocloud_tenant_config";

    fn identity(local: &TenantConfig) -> Vec<String> {
        vec![local.tenant_id.clone()]
    }

    fn declared(local: &TenantConfig) -> &[KeyValue] {
        &local.setting
    }

    fn specified(local: &TenantConfig) -> Option<&[String]> {
        local.specified_settings.as_deref()
    }

    fn strategy(local: &TenantConfig) -> Strategy {
        Strategy::from_delete_unspecified(local.delete_unspecified_settings)
    }

    fn expand_item(item: &KeyValue) -> DuploKeyStringValue {
        DuploKeyStringValue::from(item)
    }

    fn flatten_item(remote: &DuploKeyStringValue) -> KeyValue {
        KeyValue::from(remote)
    }

    fn flatten(
        all: Vec<KeyValue>,
        specified: Vec<String>,
        prior: &TenantConfig,
        id: &[String],
    ) -> TenantConfig {
        TenantConfig {
            tenant_id: id.first().cloned().unwrap_or_else(|| prior.tenant_id.clone()),
            setting: select(&all, &specified),
            delete_unspecified_settings: prior.delete_unspecified_settings,
            metadata: all,
            specified_settings: Some(specified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_manages_only_specified_keys() {
        let all = vec![KeyValue::new("a", "1"), KeyValue::new("other", "x")];
        let local = TenantConfigKind::flatten(
            all.clone(),
            vec!["a".to_string()],
            &TenantConfig::default(),
            &["t1".to_string()],
        );
        assert_eq!(local.tenant_id, "t1");
        assert_eq!(local.setting, vec![KeyValue::new("a", "1")]);
        assert_eq!(local.metadata, all);
        assert_eq!(local.specified_settings, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_strategy_follows_flag() {
        let mut local = TenantConfig::default();
        assert_eq!(TenantConfigKind::strategy(&local), Strategy::Incremental);
        local.delete_unspecified_settings = true;
        assert_eq!(TenantConfigKind::strategy(&local), Strategy::ReplaceAll);
    }
}

//! Resource Dispatch
//!
//! Maps resource type names to their engines, behind one attribute-level
//! interface used by the plan/apply host.

use super::collection::{CollectionEngine, CollectionKind};
use super::engine::{from_attrs, to_attrs, Applied, ResourceEngine, ResourceKind};
use crate::duplo::client::DuploClient;
use crate::error::{ProviderError, ProviderResult};
use crate::kinds::{
    AwsTagKind, PlanImagesKind, PlanSettingsKind, RedisInstanceKind, TenantConfigKind, TenantKind,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Lifecycle operations over validated attribute objects
#[async_trait]
pub trait Operations: Send + Sync {
    fn type_name(&self) -> &'static str;

    async fn create(&self, desired: &Value) -> ProviderResult<Applied<Value>>;

    /// `None` when the object no longer exists
    async fn read(&self, id: &str, prior: &Value) -> ProviderResult<Option<Applied<Value>>>;

    async fn update(
        &self,
        id: &str,
        prior: &Value,
        desired: &Value,
    ) -> ProviderResult<Option<Applied<Value>>>;

    async fn delete(&self, id: &str, prior: &Value) -> ProviderResult<()>;

    async fn import(&self, id: &str) -> ProviderResult<Option<Applied<Value>>>;
}

fn into_attrs<L: Serialize>(type_name: &str, applied: Applied<L>) -> ProviderResult<Applied<Value>> {
    Ok(Applied {
        id: applied.id,
        local: to_attrs(type_name, &applied.local)?,
    })
}

fn option_into_attrs<L: Serialize>(
    type_name: &str,
    applied: Option<Applied<L>>,
) -> ProviderResult<Option<Applied<Value>>> {
    applied.map(|a| into_attrs(type_name, a)).transpose()
}

#[async_trait]
impl<'a, K: ResourceKind> Operations for ResourceEngine<'a, K> {
    fn type_name(&self) -> &'static str {
        K::TYPE_NAME
    }

    async fn create(&self, desired: &Value) -> ProviderResult<Applied<Value>> {
        let desired: K::Local = from_attrs(K::TYPE_NAME, desired)?;
        into_attrs(K::TYPE_NAME, ResourceEngine::create(self, &desired).await?)
    }

    async fn read(&self, id: &str, prior: &Value) -> ProviderResult<Option<Applied<Value>>> {
        let prior: K::Local = from_attrs(K::TYPE_NAME, prior)?;
        option_into_attrs(K::TYPE_NAME, ResourceEngine::read(self, id, &prior).await?)
    }

    async fn update(
        &self,
        id: &str,
        prior: &Value,
        desired: &Value,
    ) -> ProviderResult<Option<Applied<Value>>> {
        let prior: K::Local = from_attrs(K::TYPE_NAME, prior)?;
        let desired: K::Local = from_attrs(K::TYPE_NAME, desired)?;
        option_into_attrs(
            K::TYPE_NAME,
            ResourceEngine::update(self, id, &prior, &desired).await?,
        )
    }

    async fn delete(&self, id: &str, prior: &Value) -> ProviderResult<()> {
        let prior: K::Local = from_attrs(K::TYPE_NAME, prior)?;
        ResourceEngine::delete(self, id, &prior).await
    }

    async fn import(&self, id: &str) -> ProviderResult<Option<Applied<Value>>> {
        option_into_attrs(K::TYPE_NAME, ResourceEngine::import(self, id).await?)
    }
}

#[async_trait]
impl<'a, K: CollectionKind> Operations for CollectionEngine<'a, K> {
    fn type_name(&self) -> &'static str {
        K::TYPE_NAME
    }

    async fn create(&self, desired: &Value) -> ProviderResult<Applied<Value>> {
        let desired: K::Local = from_attrs(K::TYPE_NAME, desired)?;
        into_attrs(K::TYPE_NAME, CollectionEngine::create(self, &desired).await?)
    }

    async fn read(&self, id: &str, prior: &Value) -> ProviderResult<Option<Applied<Value>>> {
        let prior: K::Local = from_attrs(K::TYPE_NAME, prior)?;
        option_into_attrs(K::TYPE_NAME, CollectionEngine::read(self, id, &prior).await?)
    }

    async fn update(
        &self,
        id: &str,
        prior: &Value,
        desired: &Value,
    ) -> ProviderResult<Option<Applied<Value>>> {
        let prior: K::Local = from_attrs(K::TYPE_NAME, prior)?;
        let desired: K::Local = from_attrs(K::TYPE_NAME, desired)?;
        option_into_attrs(
            K::TYPE_NAME,
            CollectionEngine::update(self, id, &prior, &desired).await?,
        )
    }

    async fn delete(&self, id: &str, prior: &Value) -> ProviderResult<()> {
        let prior: K::Local = from_attrs(K::TYPE_NAME, prior)?;
        CollectionEngine::delete(self, id, &prior).await
    }

    async fn import(&self, id: &str) -> ProviderResult<Option<Applied<Value>>> {
        option_into_attrs(K::TYPE_NAME, CollectionEngine::import(self, id).await?)
    }
}

/// Engine for a resource type
pub fn operations<'a>(
    type_name: &str,
    client: &'a DuploClient,
    cancel: &'a CancellationToken,
) -> ProviderResult<Box<dyn Operations + 'a>> {
    tracing::debug!("operations: type={}", type_name);

    match type_name {
        "duplocloud_tenant" => Ok(Box::new(ResourceEngine::new(TenantKind, client, cancel)?)),
        "duplocloud_tenant_config" => Ok(Box::new(
            CollectionEngine::<TenantConfigKind>::new(client, cancel)?,
        )),
        "duplocloud_plan_images" => Ok(Box::new(
            CollectionEngine::<PlanImagesKind>::new(client, cancel)?,
        )),
        "duplocloud_plan_settings" => Ok(Box::new(ResourceEngine::new(
            PlanSettingsKind,
            client,
            cancel,
        )?)),
        "duplocloud_aws_tag" => Ok(Box::new(ResourceEngine::new(AwsTagKind, client, cancel)?)),
        "duplocloud_gcp_redis_instance" => Ok(Box::new(ResourceEngine::new(
            RedisInstanceKind,
            client,
            cancel,
        )?)),
        _ => Err(ProviderError::Registry(format!(
            "unknown resource type: {}",
            type_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplo::http::HttpSettings;
    use crate::resource::registry::get_all_resource_types;

    #[test]
    fn test_every_registered_type_has_an_engine() {
        let client =
            DuploClient::new("https://portal.example.com", "token", &HttpSettings::default()).unwrap();
        let cancel = CancellationToken::new();
        for type_name in get_all_resource_types() {
            let ops = operations(type_name, &client, &cancel)
                .unwrap_or_else(|e| panic!("{}: {}", type_name, e));
            assert_eq!(ops.type_name(), type_name);
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let client =
            DuploClient::new("https://portal.example.com", "token", &HttpSettings::default()).unwrap();
        let cancel = CancellationToken::new();
        assert!(matches!(
            operations("duplocloud_nope", &client, &cancel),
            Err(ProviderError::Registry(_))
        ));
    }
}

//! Generic resource operation engine
//!
//! One engine drives Create/Read/Update/Delete for every single-object
//! resource type. The per-type parts are the registry entry (endpoints, waits,
//! timeouts) and a [`ResourceKind`] implementation (typed local/remote shapes
//! and the field mapping between them). Types whose remote API does not fit
//! the plain endpoint model override the `*_remote` hooks.

use super::id;
use super::registry::{
    extract_status, require_resource, EndpointDef, Operation, PathParams, ResourceDef,
    ToggleWaitDef,
};
use super::schema::Presence;
use super::wait;
use crate::duplo::client::{decode, DuploClient};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;

/// Everything an operation needs to talk to the API on behalf of one resource type
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub client: &'a DuploClient,
    pub def: &'static ResourceDef,
    pub cancel: &'a CancellationToken,
}

impl<'a> Context<'a> {
    pub fn new(
        type_name: &str,
        client: &'a DuploClient,
        cancel: &'a CancellationToken,
    ) -> ProviderResult<Self> {
        Ok(Self {
            client,
            def: require_resource(type_name)?,
            cancel,
        })
    }

    /// Call one of the CRUD endpoints of the resource
    pub async fn call(
        &self,
        op: Operation,
        params: &PathParams,
        body: Option<&Value>,
    ) -> ProviderResult<Option<Value>> {
        self.call_endpoint(self.def.endpoint(op)?, params, body).await
    }

    pub async fn call_endpoint(
        &self,
        endpoint: &EndpointDef,
        params: &PathParams,
        body: Option<&Value>,
    ) -> ProviderResult<Option<Value>> {
        let path = endpoint.render(params)?;
        self.client
            .send(endpoint.method.to_reqwest(), &path, body)
            .await
    }

    /// Call an endpoint and decode the response. 404 stays an error.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &EndpointDef,
        params: &PathParams,
    ) -> ProviderResult<Option<T>> {
        let path = endpoint.render(params)?;
        match self.call_endpoint(endpoint, params, None).await? {
            Some(value) => decode(value, &path).map(Some),
            None => Ok(None),
        }
    }
}

/// Serialize a typed value for a request body or for state
pub fn to_attrs<T: Serialize>(type_name: &str, value: &T) -> ProviderResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ProviderError::state(format!("{}: cannot serialize attributes: {}", type_name, e)))
}

/// Deserialize validated attributes into the typed local shape
pub fn from_attrs<T: DeserializeOwned>(type_name: &str, attrs: &Value) -> ProviderResult<T> {
    serde_json::from_value(attrs.clone())
        .map_err(|e| ProviderError::validation(type_name, "", e.to_string()))
}

/// Result of a successful create/read/update
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<L> {
    /// Persisted composite identifier
    pub id: String,
    pub local: L,
}

/// Per-type field mapping and API hooks
#[async_trait]
pub trait ResourceKind: Send + Sync + 'static {
    /// Declared and tracked shape, as stored in state
    type Local: Serialize + DeserializeOwned + Clone + Default + Debug + Send + Sync;
    /// Shape exchanged with the API
    type Remote: Serialize + DeserializeOwned + Debug + Send + Sync;

    const TYPE_NAME: &'static str;

    /// Identity segments of a declaration, in registry `id_segments` order.
    /// Empty strings stand for segments assigned by the server.
    fn identity(local: &Self::Local) -> Vec<String>;

    /// Local to remote request
    fn expand(local: &Self::Local) -> Self::Remote;

    /// Remote to local state. Local-only fields come from `prior`.
    fn flatten(remote: &Self::Remote, prior: &Self::Local, id: &[String]) -> Self::Local;

    /// Cross-field checks beyond the schema
    fn validate(&self, _local: &Self::Local) -> ProviderResult<()> {
        Ok(())
    }

    /// Path parameters for an identified object
    async fn params(&self, ctx: &Context<'_>, id: &[String]) -> ProviderResult<PathParams> {
        Ok(PathParams::from_segments(&ctx.def.id_segments, id))
    }

    /// Issue the create call and return the identity of the new object
    async fn create_remote(
        &self,
        ctx: &Context<'_>,
        local: &Self::Local,
    ) -> ProviderResult<Vec<String>> {
        let id = Self::identity(local);
        let params = self.params(ctx, &id).await?;
        let body = to_attrs(Self::TYPE_NAME, &Self::expand(local))?;
        ctx.call(Operation::Create, &params, Some(&body)).await?;
        Ok(id)
    }

    async fn fetch_remote(
        &self,
        ctx: &Context<'_>,
        params: &PathParams,
    ) -> ProviderResult<Option<Self::Remote>> {
        ctx.fetch(ctx.def.endpoint(Operation::Read)?, params).await
    }

    async fn update_remote(
        &self,
        ctx: &Context<'_>,
        params: &PathParams,
        _prior: &Self::Local,
        desired: &Self::Local,
    ) -> ProviderResult<()> {
        let body = to_attrs(Self::TYPE_NAME, &Self::expand(desired))?;
        ctx.call(Operation::Update, params, Some(&body)).await?;
        Ok(())
    }

    /// Issue the delete call. Returns false when nothing was deleted remotely,
    /// which skips the absence wait.
    async fn delete_remote(
        &self,
        ctx: &Context<'_>,
        params: &PathParams,
        _local: &Self::Local,
    ) -> ProviderResult<bool> {
        ctx.call(Operation::Delete, params, None).await?;
        Ok(true)
    }
}

/// Whether a toggle-controlled step is enabled for `local`
pub fn toggle_enabled<L: Serialize>(toggle: Option<&str>, local: &L) -> bool {
    let Some(field) = toggle else {
        return true;
    };
    serde_json::to_value(local)
        .ok()
        .and_then(|v| v.get(field).and_then(Value::as_bool))
        .unwrap_or(true)
}

/// Create/Read/Update/Delete for one resource kind
pub struct ResourceEngine<'a, K: ResourceKind> {
    kind: K,
    ctx: Context<'a>,
}

impl<'a, K: ResourceKind> ResourceEngine<'a, K> {
    pub fn new(kind: K, client: &'a DuploClient, cancel: &'a CancellationToken) -> ProviderResult<Self> {
        Ok(Self {
            kind,
            ctx: Context::new(K::TYPE_NAME, client, cancel)?,
        })
    }

    fn display(&self) -> &str {
        &self.ctx.def.display_name
    }

    fn wait_enabled(&self, wait: Option<&ToggleWaitDef>, local: &K::Local) -> bool {
        match wait {
            Some(def) => toggle_enabled(def.toggle.as_deref(), local),
            None => false,
        }
    }

    /// Reject a planned identity that could not be decoded once persisted.
    /// Only segments of computed fields may still be empty; the server assigns them.
    fn check_identity(&self, planned: &[String]) -> ProviderResult<()> {
        let def = self.ctx.def;
        let last = def.id_segments.len().saturating_sub(1);

        for (i, name) in def.id_segments.iter().enumerate() {
            let segment = planned.get(i).map(String::as_str).unwrap_or_default();
            if segment.is_empty() {
                let server_assigned = def
                    .field(name)
                    .is_some_and(|f| f.presence == Presence::Computed);
                if server_assigned {
                    continue;
                }
                return Err(ProviderError::validation(
                    K::TYPE_NAME,
                    name.as_str(),
                    "must not be empty",
                ));
            }
            if i < last && segment.contains(id::DELIMITER) {
                return Err(ProviderError::validation(
                    K::TYPE_NAME,
                    name.as_str(),
                    format!("'{}' must not contain '{}'", segment, id::DELIMITER),
                ));
            }
        }
        Ok(())
    }

    async fn params_for(&self, segments: &[String]) -> ProviderResult<PathParams> {
        self.kind.params(&self.ctx, segments).await
    }

    async fn wait_present(&self, op: Operation, id: &str, params: &PathParams) -> ProviderResult<()> {
        let what = self.display().to_string();
        wait::wait_until_present(
            &what,
            id,
            &self.ctx.def.poll_config(op),
            self.ctx.cancel,
            || self.kind.fetch_remote(&self.ctx, params),
        )
        .await
        .map(|_| ())
    }

    async fn wait_status(
        &self,
        op: Operation,
        id: &str,
        params: &PathParams,
        local: &K::Local,
    ) -> ProviderResult<()> {
        let Some((def, config)) = self.ctx.def.status_config(op) else {
            return Ok(());
        };
        if !toggle_enabled(def.toggle.as_deref(), local) {
            return Ok(());
        }

        let what = format!("{} to be {}", self.display(), def.target);
        tracing::info!("waiting for {} '{}'", what, id);
        wait::wait_for_status(
            &what,
            id,
            &def.target,
            &config,
            self.ctx.cancel,
            || self.kind.fetch_remote(&self.ctx, params),
            |remote: &K::Remote| {
                serde_json::to_value(remote)
                    .ok()
                    .and_then(|v| extract_status(&v, &def.status_path))
            },
        )
        .await
        .map(|_| ())
    }

    /// Create the object, wait for it, and return its refreshed state
    pub async fn create(&self, desired: &K::Local) -> ProviderResult<Applied<K::Local>> {
        self.kind.validate(desired)?;

        let planned = K::identity(desired);
        self.check_identity(&planned)?;

        tracing::info!("creating {} '{}'", self.display(), id::encode(&planned));
        let segments = self
            .kind
            .create_remote(&self.ctx, desired)
            .await
            .map_err(|e| e.with_context(format!("unable to create {}", self.display())))?;
        let id = id::encode(&segments);
        id::validate_segments(&segments).map_err(|msg| {
            ProviderError::upstream(
                format!("{} was created with an unusable identifier", self.display()),
                id.as_str(),
                msg,
            )
        })?;
        let params = self.params_for(&segments).await?;

        if self.wait_enabled(self.ctx.def.waits.presence.as_ref(), desired) {
            self.wait_present(Operation::Create, &id, &params).await?;
        }
        self.wait_status(Operation::Create, &id, &params, desired).await?;

        match self.kind.fetch_remote(&self.ctx, &params).await {
            Ok(Some(remote)) => Ok(Applied {
                local: K::flatten(&remote, desired, &segments),
                id,
            }),
            Ok(None) => Err(not_found_after(self.display(), "create", &id)),
            Err(e) if e.is_not_found() => Err(not_found_after(self.display(), "create", &id)),
            Err(e) => Err(e.with_context(format!("unable to retrieve {} '{}'", self.display(), id))),
        }
    }

    /// Read the object. `None` means it no longer exists remotely.
    pub async fn read(&self, id: &str, prior: &K::Local) -> ProviderResult<Option<Applied<K::Local>>> {
        let segments = id::decode(id, self.ctx.def.id_segments.len())?;
        tracing::debug!("reading {} '{}'", self.display(), id);

        let params = match self.params_for(&segments).await {
            Err(e) if e.is_not_found() => return Ok(None),
            other => other?,
        };

        match self.kind.fetch_remote(&self.ctx, &params).await {
            Ok(Some(remote)) => Ok(Some(Applied {
                id: id.to_string(),
                local: K::flatten(&remote, prior, &segments),
            })),
            Ok(None) => Ok(None),
            Err(e) if e.is_not_found() => {
                tracing::info!("{} '{}' not found, clearing identity", self.display(), id);
                Ok(None)
            }
            Err(e) => Err(e.with_context(format!("unable to retrieve {} '{}'", self.display(), id))),
        }
    }

    /// Update in place. `None` means the object disappeared.
    pub async fn update(
        &self,
        id: &str,
        prior: &K::Local,
        desired: &K::Local,
    ) -> ProviderResult<Option<Applied<K::Local>>> {
        self.kind.validate(desired)?;
        let segments = id::decode(id, self.ctx.def.id_segments.len())?;

        let params = match self.params_for(&segments).await {
            Err(e) if e.is_not_found() => return Ok(None),
            other => other?,
        };

        tracing::info!("updating {} '{}'", self.display(), id);
        match self
            .kind
            .update_remote(&self.ctx, &params, prior, desired)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!("{} '{}' not found during update", self.display(), id);
                return Ok(None);
            }
            Err(e) => {
                return Err(e.with_context(format!("unable to update {} '{}'", self.display(), id)))
            }
        }

        if self.wait_enabled(self.ctx.def.waits.presence.as_ref(), desired) {
            self.wait_present(Operation::Update, id, &params).await?;
        }
        self.wait_status(Operation::Update, id, &params, desired).await?;

        self.read(id, desired).await
    }

    /// Delete the object. Already-absent objects are not an error.
    pub async fn delete(&self, id: &str, prior: &K::Local) -> ProviderResult<()> {
        let segments = id::decode(id, self.ctx.def.id_segments.len())?;

        let params = match self.params_for(&segments).await {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        };

        tracing::info!("deleting {} '{}'", self.display(), id);
        let issued = match self.kind.delete_remote(&self.ctx, &params, prior).await {
            Ok(issued) => issued,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => {
                return Err(e.with_context(format!("unable to delete {} '{}'", self.display(), id)))
            }
        };

        if issued && self.wait_enabled(self.ctx.def.waits.absence.as_ref(), prior) {
            let what = self.display().to_string();
            wait::wait_until_absent(
                &what,
                id,
                &self.ctx.def.poll_config(Operation::Delete),
                self.ctx.cancel,
                || self.kind.fetch_remote(&self.ctx, &params),
            )
            .await?;
        }

        Ok(())
    }

    /// Adopt an existing remote object by identifier
    pub async fn import(&self, id: &str) -> ProviderResult<Option<Applied<K::Local>>> {
        self.read(id, &K::Local::default()).await
    }
}

fn not_found_after(display: &str, op: &str, id: &str) -> ProviderError {
    ProviderError::upstream(
        format!("{} '{}' not found after {}", display, id, op),
        "",
        "the object was accepted but could not be read back",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Flags {
        wait_until_ready: bool,
        name: String,
    }

    #[test]
    fn test_toggle_enabled_reads_bool_attribute() {
        let on = Flags {
            wait_until_ready: true,
            name: "x".to_string(),
        };
        let off = Flags {
            wait_until_ready: false,
            name: "x".to_string(),
        };
        assert!(toggle_enabled(Some("wait_until_ready"), &on));
        assert!(!toggle_enabled(Some("wait_until_ready"), &off));
        assert!(toggle_enabled(None, &off));
        // non-bool or missing attributes leave the step enabled
        assert!(toggle_enabled(Some("name"), &off));
        assert!(toggle_enabled(Some("missing"), &off));
    }

    #[test]
    fn test_from_attrs_reports_validation_error() {
        let err = from_attrs::<Flags>("t", &serde_json::json!({"name": 3})).unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
    }
}

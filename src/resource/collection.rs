//! Collection-valued resources
//!
//! Resources such as tenant settings or plan images are a parent identifier
//! plus a keyed collection living under it. Each operation lists the remote
//! collection, reconciles it against the declaration, and writes only the
//! difference.

use super::differ::{duplicate_key, reconcile, ChangeSet, Keyed, Strategy};
use super::engine::{to_attrs, Applied, Context};
use super::id;
use super::registry::{CollectionDef, PathParams};
use crate::duplo::client::DuploClient;
use crate::error::{ProviderError, ProviderResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

/// List/upsert/delete calls for the first collection of a resource
pub struct CollectionApi<'a> {
    ctx: Context<'a>,
    def: &'static CollectionDef,
    params: PathParams,
}

impl<'a> CollectionApi<'a> {
    pub fn new(ctx: Context<'a>, params: PathParams) -> ProviderResult<Self> {
        let def = ctx.def.collections.first().ok_or_else(|| {
            ProviderError::Registry(format!("{} has no collection", ctx.def.display_name))
        })?;
        Ok(Self { ctx, def, params })
    }

    pub fn def(&self) -> &'static CollectionDef {
        self.def
    }

    /// Full remote collection. An empty body is an empty collection.
    pub async fn list<R: DeserializeOwned>(&self) -> ProviderResult<Vec<R>> {
        Ok(self
            .ctx
            .fetch::<Vec<R>>(&self.def.list, &self.params)
            .await?
            .unwrap_or_default())
    }

    pub async fn upsert<R: Serialize>(&self, item: &R) -> ProviderResult<()> {
        let body = to_attrs(&self.ctx.def.display_name, item)?;
        self.ctx
            .call_endpoint(&self.def.upsert, &self.params, Some(&body))
            .await?;
        Ok(())
    }

    /// Delete one item. An item that is already gone is not an error.
    pub async fn delete(&self, key: &str) -> ProviderResult<()> {
        let params = self.params.clone().with(&self.def.key, key);
        match self.ctx.call_endpoint(&self.def.delete, &params, None).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} item '{}' already absent", self.ctx.def.display_name, key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Write a change set: upserts first, then deletes
    pub async fn apply<I, R, F>(&self, changes: &ChangeSet<I>, expand: F) -> ProviderResult<()>
    where
        I: Keyed,
        R: Serialize,
        F: Fn(&I) -> R,
    {
        if changes.is_empty() {
            tracing::debug!("{}: collection already converged", self.ctx.def.display_name);
            return Ok(());
        }

        for item in &changes.upserts {
            tracing::info!("{}: upserting '{}'", self.ctx.def.display_name, item.key());
            self.upsert(&expand(item)).await?;
        }
        for key in &changes.deletes {
            tracing::info!("{}: deleting '{}'", self.ctx.def.display_name, key);
            self.delete(key).await?;
        }
        Ok(())
    }
}

/// Per-type mapping of a collection resource
pub trait CollectionKind: Send + Sync + 'static {
    type Local: Serialize + DeserializeOwned + Clone + Default + Debug + Send + Sync;
    /// One declared or tracked item
    type Item: Keyed + Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync;
    /// One item as exchanged with the API
    type RemoteItem: Serialize + DeserializeOwned + Debug + Send + Sync;

    const TYPE_NAME: &'static str;

    /// Parent identity segments
    fn identity(local: &Self::Local) -> Vec<String>;

    fn declared(local: &Self::Local) -> &[Self::Item];

    /// Keys recorded by the last successful apply, `None` before the first
    fn specified(local: &Self::Local) -> Option<&[String]>;

    fn strategy(local: &Self::Local) -> Strategy;

    fn expand_item(item: &Self::Item) -> Self::RemoteItem;

    fn flatten_item(remote: &Self::RemoteItem) -> Self::Item;

    /// Rebuild local state from the full collection and the managed keys.
    /// Local-only fields come from `prior`.
    fn flatten(
        all: Vec<Self::Item>,
        specified: Vec<String>,
        prior: &Self::Local,
        id: &[String],
    ) -> Self::Local;
}

/// Create/Read/Update/Delete for one collection kind
pub struct CollectionEngine<'a, K: CollectionKind> {
    ctx: Context<'a>,
    _kind: PhantomData<K>,
}

impl<'a, K: CollectionKind> CollectionEngine<'a, K> {
    pub fn new(client: &'a DuploClient, cancel: &'a CancellationToken) -> ProviderResult<Self> {
        Ok(Self {
            ctx: Context::new(K::TYPE_NAME, client, cancel)?,
            _kind: PhantomData,
        })
    }

    fn display(&self) -> &str {
        &self.ctx.def.display_name
    }

    fn api(&self, segments: &[String]) -> ProviderResult<CollectionApi<'a>> {
        CollectionApi::new(
            self.ctx,
            PathParams::from_segments(&self.ctx.def.id_segments, segments),
        )
    }

    async fn list(&self, api: &CollectionApi<'_>) -> ProviderResult<Vec<K::Item>> {
        let remote: Vec<K::RemoteItem> = api.list().await?;
        Ok(remote.iter().map(K::flatten_item).collect())
    }

    fn check_declared(&self, desired: &K::Local) -> ProviderResult<()> {
        if let Some(key) = duplicate_key(K::declared(desired)) {
            let field = self
                .ctx
                .def
                .collections
                .first()
                .map(|c| c.field.as_str())
                .unwrap_or_default();
            return Err(ProviderError::validation(
                K::TYPE_NAME,
                field,
                format!("duplicate key '{}'", key),
            ));
        }
        Ok(())
    }

    /// List, reconcile, write the difference, and list again
    async fn converge(
        &self,
        segments: &[String],
        prior_specified: Option<&[String]>,
        strategy: Strategy,
        desired: &K::Local,
    ) -> ProviderResult<Applied<K::Local>> {
        if self.ctx.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled {
                what: self.display().to_string(),
                id: id::encode(segments),
            });
        }

        let api = self.api(segments)?;
        let all = self.list(&api).await?;
        let reconciliation = reconcile(&all, prior_specified, K::declared(desired).to_vec());
        let changes = reconciliation.changes(&all, strategy);
        tracing::debug!(
            "{} '{}': {} upsert(s), {} delete(s)",
            self.display(),
            id::encode(segments),
            changes.upserts.len(),
            changes.deletes.len()
        );
        api.apply(&changes, K::expand_item).await?;

        let all = self.list(&api).await?;
        Ok(Applied {
            id: id::encode(segments),
            local: K::flatten(all, reconciliation.specified, desired, segments),
        })
    }

    pub async fn create(&self, desired: &K::Local) -> ProviderResult<Applied<K::Local>> {
        self.check_declared(desired)?;
        let segments = K::identity(desired);
        tracing::info!("creating {} '{}'", self.display(), id::encode(&segments));
        self.converge(&segments, None, K::strategy(desired), desired)
            .await
            .map_err(|e| e.with_context(format!("unable to create {}", self.display())))
    }

    pub async fn read(&self, id: &str, prior: &K::Local) -> ProviderResult<Option<Applied<K::Local>>> {
        let segments = id::decode(id, self.ctx.def.id_segments.len())?;
        let api = self.api(&segments)?;
        let all = match self.list(&api).await {
            Ok(all) => all,
            Err(e) if e.is_not_found() => {
                tracing::info!("{} '{}' not found, clearing identity", self.display(), id);
                return Ok(None);
            }
            Err(e) => {
                return Err(e.with_context(format!("unable to retrieve {} '{}'", self.display(), id)))
            }
        };
        let specified = K::specified(prior).map(<[String]>::to_vec).unwrap_or_default();
        Ok(Some(Applied {
            id: id.to_string(),
            local: K::flatten(all, specified, prior, &segments),
        }))
    }

    pub async fn update(
        &self,
        id: &str,
        prior: &K::Local,
        desired: &K::Local,
    ) -> ProviderResult<Option<Applied<K::Local>>> {
        self.check_declared(desired)?;
        let segments = id::decode(id, self.ctx.def.id_segments.len())?;
        tracing::info!("updating {} '{}'", self.display(), id);
        match self
            .converge(&segments, K::specified(prior), K::strategy(desired), desired)
            .await
        {
            Ok(applied) => Ok(Some(applied)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.with_context(format!("unable to update {} '{}'", self.display(), id))),
        }
    }

    /// Remove the managed items. With replace-all, every item is removed.
    pub async fn delete(&self, id: &str, prior: &K::Local) -> ProviderResult<()> {
        let segments = id::decode(id, self.ctx.def.id_segments.len())?;
        tracing::info!("deleting {} '{}'", self.display(), id);
        match self
            .converge(&segments, K::specified(prior), K::strategy(prior), &K::Local::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.with_context(format!("unable to delete {} '{}'", self.display(), id))),
        }
    }

    pub async fn import(&self, id: &str) -> ProviderResult<Option<Applied<K::Local>>> {
        self.read(id, &K::Local::default()).await
    }
}

//! Plan, apply, refresh, destroy and import
//!
//! Drives the resource engines from a validated manifest and the local state.
//! Every successful remote operation is recorded in the state immediately, so
//! a failure part-way through leaves the state matching what was done.

use crate::duplo::client::DuploClient;
use crate::error::{ProviderError, ProviderResult};
use crate::manifest::Declaration;
use crate::resource::dispatch::{operations, Operations};
use crate::resource::engine::Applied;
use crate::resource::registry::require_resource;
use crate::resource::schema;
use crate::resource::state::{address, StateEntry, StateFile};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// What apply will do to one resource
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create,
    Update { changed: Vec<String> },
    /// Delete then create, because a force-new field changed
    Replace { fields: Vec<String> },
    NoOp,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update { changed } => write!(f, "update ({})", changed.join(", ")),
            Action::Replace { fields } => write!(f, "replace (forced by {})", fields.join(", ")),
            Action::NoOp => write!(f, "no changes"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub resource_type: String,
    pub name: String,
    pub action: Action,
    /// Declared attributes with sensitive values redacted
    pub attributes: Option<Value>,
}

impl PlannedChange {
    pub fn address(&self) -> String {
        address(&self.resource_type, &self.name)
    }
}

/// Counts shown at the end of a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub add: usize,
    pub change: usize,
    pub destroy: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.add, self.change, self.destroy
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub changes: Vec<PlannedChange>,
}

impl Plan {
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.action != Action::NoOp)
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for change in &self.changes {
            match change.action {
                Action::Create => summary.add += 1,
                Action::Update { .. } => summary.change += 1,
                Action::Replace { .. } => {
                    summary.add += 1;
                    summary.destroy += 1;
                }
                Action::Delete => summary.destroy += 1,
                Action::NoOp => {}
            }
        }
        summary
    }
}

/// Result of a refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    /// Addresses dropped because the remote object is gone
    pub removed: Vec<String>,
}

/// A planned change with what apply needs to carry it out
struct Step {
    change: PlannedChange,
    /// Refreshed state, absent for creates
    prior: Option<Applied<Value>>,
    desired: Option<Value>,
}

/// Runs lifecycle operations against one portal
pub struct Executor<'a> {
    client: &'a DuploClient,
    cancel: &'a CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(client: &'a DuploClient, cancel: &'a CancellationToken) -> Self {
        Self { client, cancel }
    }

    fn ops(&self, resource_type: &str) -> ProviderResult<Box<dyn Operations + 'a>> {
        operations(resource_type, self.client, self.cancel)
    }

    fn check_cancelled(&self, what: &str, id: &str) -> ProviderResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled {
                what: what.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn steps(&self, decls: &[Declaration], state: &StateFile) -> ProviderResult<Vec<Step>> {
        let mut steps = Vec::with_capacity(decls.len());

        for decl in decls {
            self.check_cancelled("plan", &decl.address())?;
            let def = require_resource(&decl.resource_type)?;
            let change = |action| PlannedChange {
                resource_type: decl.resource_type.clone(),
                name: decl.name.clone(),
                action,
                attributes: Some(schema::redact(&def.fields, &decl.attributes)),
            };

            let prior = match state.find(&decl.resource_type, &decl.name) {
                Some(entry) => {
                    let ops = self.ops(&entry.resource_type)?;
                    let refreshed = ops.read(&entry.id, &entry.attributes).await?;
                    if refreshed.is_none() {
                        tracing::info!("{} no longer exists remotely", entry.address());
                    }
                    refreshed
                }
                None => None,
            };

            let action = match &prior {
                None => Action::Create,
                Some(prior) => {
                    let changes = schema::diff(&def.fields, &prior.local, &decl.attributes);
                    if changes.is_empty() {
                        Action::NoOp
                    } else if changes.requires_replacement() {
                        Action::Replace {
                            fields: changes.force_new,
                        }
                    } else {
                        Action::Update {
                            changed: changes.changed,
                        }
                    }
                }
            };

            steps.push(Step {
                change: change(action),
                prior,
                desired: Some(decl.attributes.clone()),
            });
        }

        let declared: HashSet<String> = decls.iter().map(Declaration::address).collect();
        for entry in &state.resources {
            if declared.contains(&entry.address()) {
                continue;
            }
            steps.push(Step {
                change: PlannedChange {
                    resource_type: entry.resource_type.clone(),
                    name: entry.name.clone(),
                    action: Action::Delete,
                    attributes: None,
                },
                prior: Some(Applied {
                    id: entry.id.clone(),
                    local: entry.attributes.clone(),
                }),
                desired: None,
            });
        }

        Ok(steps)
    }

    /// Compare declarations with refreshed state. Nothing is written.
    pub async fn plan(&self, decls: &[Declaration], state: &StateFile) -> ProviderResult<Plan> {
        let steps = self.steps(decls, state).await?;
        Ok(Plan {
            changes: steps.into_iter().map(|s| s.change).collect(),
        })
    }

    /// Converge remote objects to the declarations, recording each result in `state`
    pub async fn apply(&self, decls: &[Declaration], state: &mut StateFile) -> ProviderResult<Plan> {
        let steps = self.steps(decls, state).await?;

        for step in &steps {
            let change = &step.change;
            let addr = change.address();
            self.check_cancelled("apply", &addr)?;
            let ops = self.ops(&change.resource_type)?;
            let desired = step.desired.as_ref().unwrap_or(&Value::Null);

            match (&change.action, &step.prior) {
                (Action::NoOp, Some(prior)) => {
                    self.record(state, change, prior.clone());
                }
                (Action::Create, _) => {
                    state.remove(&change.resource_type, &change.name);
                    tracing::info!("{}: creating", addr);
                    let applied = ops.create(desired).await?;
                    self.record(state, change, applied);
                }
                (Action::Update { .. }, Some(prior)) => {
                    tracing::info!("{}: {}", addr, change.action);
                    match ops.update(&prior.id, &prior.local, desired).await? {
                        Some(applied) => self.record(state, change, applied),
                        None => {
                            tracing::warn!("{} disappeared during update, creating it", addr);
                            state.remove(&change.resource_type, &change.name);
                            let applied = ops.create(desired).await?;
                            self.record(state, change, applied);
                        }
                    }
                }
                (Action::Replace { .. }, Some(prior)) => {
                    tracing::info!("{}: {}", addr, change.action);
                    ops.delete(&prior.id, &prior.local).await?;
                    state.remove(&change.resource_type, &change.name);
                    let applied = ops.create(desired).await?;
                    self.record(state, change, applied);
                }
                (Action::Delete, Some(prior)) => {
                    tracing::info!("{}: deleting", addr);
                    ops.delete(&prior.id, &prior.local).await?;
                    state.remove(&change.resource_type, &change.name);
                }
                (action, None) => {
                    return Err(ProviderError::state(format!(
                        "{}: {} planned without prior state",
                        addr, action
                    )));
                }
            }
        }

        Ok(Plan {
            changes: steps.into_iter().map(|s| s.change).collect(),
        })
    }

    fn record(&self, state: &mut StateFile, change: &PlannedChange, applied: Applied<Value>) {
        state.upsert(StateEntry::new(
            &change.resource_type,
            &change.name,
            applied.id,
            applied.local,
        ));
    }

    /// Re-read every managed object; drop the ones that are gone
    pub async fn refresh(&self, state: &mut StateFile) -> ProviderResult<RefreshReport> {
        let mut report = RefreshReport::default();
        let entries = state.resources.clone();

        for entry in entries {
            self.check_cancelled("refresh", &entry.address())?;
            let ops = self.ops(&entry.resource_type)?;
            match ops.read(&entry.id, &entry.attributes).await? {
                Some(applied) => {
                    state.upsert(StateEntry::new(
                        &entry.resource_type,
                        &entry.name,
                        applied.id,
                        applied.local,
                    ));
                    report.refreshed.push(entry.address());
                }
                None => {
                    tracing::info!("{} no longer exists remotely, removing from state", entry.address());
                    state.remove(&entry.resource_type, &entry.name);
                    report.removed.push(entry.address());
                }
            }
        }

        Ok(report)
    }

    /// Delete every managed object, newest first
    pub async fn destroy(&self, state: &mut StateFile) -> ProviderResult<Vec<String>> {
        let mut destroyed = Vec::new();
        let entries: Vec<StateEntry> = state.resources.iter().rev().cloned().collect();

        for entry in entries {
            self.check_cancelled("destroy", &entry.address())?;
            tracing::info!("{}: deleting", entry.address());
            let ops = self.ops(&entry.resource_type)?;
            ops.delete(&entry.id, &entry.attributes).await?;
            state.remove(&entry.resource_type, &entry.name);
            destroyed.push(entry.address());
        }

        Ok(destroyed)
    }

    /// Adopt an existing remote object under `name`
    pub async fn import(
        &self,
        state: &mut StateFile,
        resource_type: &str,
        name: &str,
        id: &str,
    ) -> ProviderResult<StateEntry> {
        if state.find(resource_type, name).is_some() {
            return Err(ProviderError::validation(
                resource_type,
                "name",
                format!("{} is already managed", address(resource_type, name)),
            ));
        }

        let ops = self.ops(resource_type)?;
        let applied = ops.import(id).await?.ok_or_else(|| ProviderError::NotFound {
            url: id.to_string(),
            message: format!("{} '{}' does not exist", resource_type, id),
        })?;

        let entry = StateEntry::new(resource_type, name, applied.id, applied.local);
        state.upsert(entry.clone());
        Ok(entry)
    }
}

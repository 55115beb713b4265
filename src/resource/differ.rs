//! Reconciliation differ for collection-valued sub-resources
//!
//! A parent resource (tenant, plan) owns a remote collection of keyed items.
//! The user declares only a subset; the keys of that subset are persisted as
//! the "specified" set so the next reconciliation knows which remote items it
//! manages. Items outside the specified set belong to someone else and are
//! left alone unless the parent asks for replace-all semantics.

use std::collections::{HashMap, HashSet};

/// An item identified by a natural key
pub trait Keyed {
    fn key(&self) -> &str;
}

/// How a reconciliation treats remote items that were never declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Only touch items that were previously or are now declared
    #[default]
    Incremental,
    /// Make the remote collection equal to the declared items
    ReplaceAll,
}

impl Strategy {
    /// Strategy selected by a `delete_unspecified_*` flag
    pub fn from_delete_unspecified(flag: bool) -> Self {
        if flag {
            Self::ReplaceAll
        } else {
            Self::Incremental
        }
    }
}

/// Previous/desired sets computed for one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<T> {
    /// Remote items whose keys were specified by the prior declaration
    pub previous: Vec<T>,
    /// Items declared now, verbatim
    pub desired: Vec<T>,
    /// Keys of `desired`, to be persisted
    pub specified: Vec<String>,
}

/// Remote writes needed to converge a collection
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<T> {
    pub upserts: Vec<T>,
    pub deletes: Vec<String>,
}

impl<T> ChangeSet<T> {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Split the full collection into items owned by `keys` (in key order) and the rest
pub fn partition<T: Keyed + Clone>(all: &[T], keys: &[String]) -> (Vec<T>, Vec<T>) {
    let by_key: HashMap<&str, &T> = all.iter().map(|item| (item.key(), item)).collect();
    let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    let owned = keys
        .iter()
        .filter(|k| seen.insert(k.as_str()))
        .filter_map(|k| by_key.get(k.as_str()).map(|item| (*item).clone()))
        .collect();

    let unmanaged = all
        .iter()
        .filter(|item| !wanted.contains(item.key()))
        .cloned()
        .collect();

    (owned, unmanaged)
}

/// Remote items whose keys are in `keys`, ordered by `keys`
pub fn select<T: Keyed + Clone>(all: &[T], keys: &[String]) -> Vec<T> {
    partition(all, keys).0
}

/// First duplicated key in a declaration, if any
pub fn duplicate_key<T: Keyed>(items: &[T]) -> Option<&str> {
    let mut seen = HashSet::new();
    items.iter().map(Keyed::key).find(|k| !seen.insert(*k))
}

/// Compute previous/desired sets.
///
/// `prior_specified` is `None` on first creation, which makes `previous` empty.
pub fn reconcile<T: Keyed + Clone>(
    all: &[T],
    prior_specified: Option<&[String]>,
    desired: Vec<T>,
) -> Reconciliation<T> {
    let previous = match prior_specified {
        Some(keys) => select(all, keys),
        None => Vec::new(),
    };
    let specified = desired.iter().map(|item| item.key().to_string()).collect();

    Reconciliation {
        previous,
        desired,
        specified,
    }
}

impl<T: Keyed + Clone + PartialEq> Reconciliation<T> {
    /// Change set for the given strategy.
    ///
    /// Desired items already present remotely with identical content produce no
    /// write, so re-applying the same declaration is a no-op.
    pub fn changes(&self, all: &[T], strategy: Strategy) -> ChangeSet<T> {
        let baseline: &[T] = match strategy {
            Strategy::ReplaceAll => all,
            Strategy::Incremental => &self.previous,
        };

        let remote: HashMap<&str, &T> = all.iter().map(|item| (item.key(), item)).collect();
        let desired_keys: HashSet<&str> = self.desired.iter().map(Keyed::key).collect();

        let upserts = self
            .desired
            .iter()
            .filter(|item| remote.get(item.key()).copied() != Some(*item))
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        let deletes = baseline
            .iter()
            .map(Keyed::key)
            .filter(|k| !desired_keys.contains(k))
            .filter(|k| seen.insert(*k))
            .map(str::to_string)
            .collect();

        ChangeSet { upserts, deletes }
    }
}

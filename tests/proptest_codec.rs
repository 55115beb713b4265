//! Property-based tests using proptest
//!
//! These tests verify the identifier codec and the collection differ
//! using randomized inputs.

use duplo_provider::resource::differ::{partition, reconcile, Keyed, Strategy as Mode};
use duplo_provider::resource::id;
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
struct Item {
    key: String,
    value: String,
}

impl Keyed for Item {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Segments without the delimiter
fn arb_segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9:._-]{1,20}"
}

/// Items with unique keys
fn arb_items() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::btree_map("[a-f]{1,2}", "[0-9]{1,2}", 0..12).prop_map(|m| {
        m.into_iter()
            .map(|(key, value)| Item { key, value })
            .collect()
    })
}

fn arb_keys() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-f]{1,2}", 0..8)
}

proptest! {
    /// Encoding then decoding returns the input segments
    #[test]
    fn id_roundtrip(segments in prop::collection::vec(arb_segment(), 1..4)) {
        let encoded = id::encode(&segments);
        let decoded = id::decode(&encoded, segments.len()).unwrap();
        prop_assert_eq!(decoded, segments);
    }

    /// Extra delimiters always land in the last segment
    #[test]
    fn id_tail_keeps_delimiters(head in arb_segment(), tail in "[a-z]{1,5}(/[a-z]{1,5}){0,3}") {
        let encoded = format!("{}/{}", head, tail);
        let decoded = id::decode(&encoded, 2).unwrap();
        prop_assert_eq!(&decoded[0], &head);
        prop_assert_eq!(&decoded[1], &tail);
    }

    /// Decoding never panics and either fails or yields the requested count
    #[test]
    fn id_decode_is_total(input in ".{0,40}", expected in 0usize..5) {
        if let Ok(parts) = id::decode(&input, expected) {
            prop_assert_eq!(parts.len(), expected);
            prop_assert!(parts.iter().all(|p| !p.is_empty()));
        }
    }

    /// Owned and unmanaged items together cover the collection exactly once
    #[test]
    fn partition_covers_collection(all in arb_items(), keys in arb_keys()) {
        let (owned, unmanaged) = partition(&all, &keys);
        prop_assert_eq!(owned.len() + unmanaged.len(), all.len());

        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        prop_assert!(owned.iter().all(|i| wanted.contains(i.key())));
        prop_assert!(unmanaged.iter().all(|i| !wanted.contains(i.key())));
    }

    /// Incremental reconciliation only deletes previously specified keys
    #[test]
    fn incremental_never_deletes_outside_previous(
        all in arb_items(),
        prior in arb_keys(),
        desired in arb_items(),
    ) {
        let r = reconcile(&all, Some(prior.as_slice()), desired.clone());
        let changes = r.changes(&all, Mode::Incremental);

        let prior_set: HashSet<&str> = prior.iter().map(String::as_str).collect();
        let desired_set: HashSet<&str> = desired.iter().map(Keyed::key).collect();
        for key in &changes.deletes {
            prop_assert!(prior_set.contains(key.as_str()));
            prop_assert!(!desired_set.contains(key.as_str()));
        }
    }

    /// Replace-all leaves exactly the desired keys behind
    #[test]
    fn replace_all_converges_to_desired(all in arb_items(), desired in arb_items()) {
        let r = reconcile(&all, None, desired.clone());
        let changes = r.changes(&all, Mode::ReplaceAll);

        let mut remaining: HashSet<String> = all.iter().map(|i| i.key.clone()).collect();
        for key in &changes.deletes {
            remaining.remove(key);
        }
        for item in &changes.upserts {
            remaining.insert(item.key.clone());
        }
        let expected: HashSet<String> = desired.iter().map(|i| i.key.clone()).collect();
        prop_assert_eq!(remaining, expected);
    }

    /// Applying the same declaration twice writes nothing the second time
    #[test]
    fn reapply_is_noop(desired in arb_items(), extra in arb_items()) {
        // Remote holds the desired items plus unrelated ones
        let desired_keys: HashSet<&str> = desired.iter().map(Keyed::key).collect();
        let mut all = desired.clone();
        all.extend(extra.into_iter().filter(|i| !desired_keys.contains(i.key())));

        let specified: Vec<String> = desired.iter().map(|i| i.key.clone()).collect();
        let changes = reconcile(&all, Some(specified.as_slice()), desired).changes(&all, Mode::Incremental);
        prop_assert!(changes.is_empty());
    }
}

// pot-rust/tests/invariants.rs

//! Randomized model comparison plus a structural walker asserting the trie
//! invariants on every intermediate root.

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};

use common::MockEntry;
use pot_rust::node::{Entry, Node};
use pot_rust::ops::po;
use pot_rust::{Index, InMemoryStore, LoadSaver, PotError, SingleOrder, SwarmPot};

const DEPTH: usize = 256;

/// Walks the reachable tree and asserts:
/// - every fork's first differing bit against its parent's key is exactly
///   its attachment order (prefix invariant);
/// - fork orders are strictly increasing and below the depth;
/// - every recorded sub-tree size matches the actual entry count;
/// - no key occurs twice.
///
/// Returns the number of entries seen.
fn check_invariants(root: &Arc<Node<MockEntry>>) -> usize {
    if root.is_empty() {
        assert_eq!(root.size(), 0);
        return 0;
    }
    let mut keys = HashSet::new();
    let total = walk(root, 0, &mut keys);
    assert_eq!(root.size(), total, "root size mismatch");
    total
}

fn walk(node: &Arc<Node<MockEntry>>, from: usize, keys: &mut HashSet<Vec<u8>>) -> usize {
    let mem = node.mem().expect("walker runs on materialised tries");
    let key = mem.key().to_vec();
    assert!(keys.insert(key.clone()), "duplicate key in trie");

    let mut total = 1;
    let mut prev: Option<usize> = None;
    for fork in mem.iter_from(from) {
        if let Some(p) = prev {
            assert!(fork.at > p, "fork orders must strictly increase");
        }
        prev = Some(fork.at);
        assert!(fork.at < DEPTH, "fork order out of range");

        let child = fork.node.as_ref().expect("forks are non-empty");
        let child_mem = child.mem().expect("materialised");
        assert_eq!(
            po(child_mem.key(), mem.key(), 0),
            fork.at,
            "fork key does not diverge at its attachment order"
        );
        let sub = walk(child, fork.at + 1, keys);
        assert_eq!(sub, fork.size, "recorded sub-tree size is stale");
        total += sub;
    }
    total
}

#[tokio::test]
async fn random_workload_preserves_invariants() {
    let mut rng = StdRng::seed_from_u64(42);
    let idx: Index<MockEntry, SingleOrder> = Index::new(SingleOrder::new(DEPTH));
    let mut model: HashMap<Vec<u8>, u32> = HashMap::new();

    for step in 0..400u32 {
        let n = rng.gen_range(0..64u32);
        let e = MockEntry::det(n);
        if rng.gen_bool(0.6) {
            // insert, or overwrite with a step-dependent value
            let e = MockEntry::new(e.key.clone(), n + step);
            model.insert(e.key.clone(), e.val);
            idx.add(e).await.unwrap();
        } else {
            model.remove(&e.key);
            idx.delete(&e.key).await.unwrap();
        }

        let root = idx.snapshot();
        let seen = check_invariants(&root);
        assert_eq!(seen, model.len(), "entry count diverged at step {step}");
        assert_eq!(idx.size(), model.len());
    }

    // Final state: the trie and the model agree on every key.
    for (k, v) in &model {
        let got = idx.find(k).await.unwrap();
        assert_eq!(got.val, *v);
    }
    for n in 0..64u32 {
        let e = MockEntry::det(n);
        if !model.contains_key(&e.key) {
            assert!(matches!(idx.find(&e.key).await, Err(PotError::NotFound)));
        }
    }
}

#[tokio::test]
async fn iteration_is_complete_and_closest_first() {
    let mut rng = StdRng::seed_from_u64(7);
    let idx: Index<MockEntry, SingleOrder> = Index::new(SingleOrder::new(DEPTH));
    let mut present = HashSet::new();
    for _ in 0..80 {
        let n = rng.gen_range(0..128u32);
        let e = MockEntry::det(n);
        present.insert(e.key.clone());
        idx.add(e).await.unwrap();
    }

    for _ in 0..8 {
        let target = MockEntry::det(rng.gen_range(0..1024u32)).key;
        let mut visited = HashSet::new();
        let mut last_po = usize::MAX;
        idx.iterate(&[], &target, |e: &MockEntry| {
            let p = po(e.key(), &target, 0);
            assert!(p <= last_po, "iteration must be closest-first");
            last_po = p;
            assert!(visited.insert(e.key().to_vec()), "entry visited twice");
            Ok(false)
        })
        .await
        .unwrap();
        assert_eq!(visited, present, "iteration missed entries");
    }
}

#[tokio::test]
async fn persisted_random_workload_survives_reloads() {
    let mut rng = StdRng::seed_from_u64(1337);
    let ls = Arc::new(InMemoryStore::new());
    let mut idx: Index<MockEntry, SwarmPot<MockEntry>> = Index::new(SwarmPot::new(
        SingleOrder::new(DEPTH),
        Arc::clone(&ls) as Arc<dyn LoadSaver>,
    ));
    let mut model: HashMap<Vec<u8>, u32> = HashMap::new();

    for round in 0..4 {
        for _ in 0..60 {
            let n = rng.gen_range(0..48u32);
            let e = MockEntry::det(n);
            if rng.gen_bool(0.7) {
                model.insert(e.key.clone(), e.val);
                idx.add(e).await.unwrap();
            } else {
                model.remove(&e.key);
                idx.delete(&e.key).await.unwrap();
            }
            assert_eq!(idx.size(), model.len());
        }
        if model.is_empty() {
            continue;
        }

        // Save, drop, reload from the reference; nothing may be lost.
        let reference = idx.save().await.unwrap();
        let mode: SwarmPot<MockEntry> =
            SwarmPot::new(SingleOrder::new(DEPTH), Arc::clone(&ls) as Arc<dyn LoadSaver>);
        idx = Index::with_reference(mode, &reference).await.unwrap();
        assert_eq!(idx.size(), model.len(), "size diverged after round {round}");
        for (k, v) in &model {
            let got = idx.find(k).await.unwrap();
            assert_eq!(got.val, *v);
        }
    }
}

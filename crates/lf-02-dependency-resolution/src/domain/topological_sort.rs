//! # Topological Sort
//!
//! Orders a backchain so every transaction follows all of its
//! dependencies. Dependencies that were never added (already held
//! locally) are treated as satisfied and do not appear in the output.
//!
//! ```text
//! T3 ──▶ T1          add(T3, {T1, T2})
//!  │     ▲           add(T2, {T1})
//!  └──▶ T2           add(T1, {})
//!                    complete() == [T1, T2, T3]
//! ```

use crate::error::{ResolutionError, ResolutionResult};
use shared_types::SecureHash;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Accumulates a dependency graph for one resolution run.
#[derive(Debug, Default)]
pub struct TopologicalSort {
    /// Node to the transactions it depends on.
    dependencies: BTreeMap<SecureHash, BTreeSet<SecureHash>>,
    /// Dependency to the nodes depending on it.
    dependents: BTreeMap<SecureHash, BTreeSet<SecureHash>>,
    /// Insertion order, for a stable traversal.
    order: Vec<SecureHash>,
}

impl TopologicalSort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Each id may be added once.
    pub fn add(&mut self, id: SecureHash, dependencies: BTreeSet<SecureHash>) -> ResolutionResult<()> {
        if self.dependencies.contains_key(&id) {
            return Err(ResolutionError::DuplicateNode(id));
        }
        for dependency in &dependencies {
            self.dependents.entry(*dependency).or_default().insert(id);
        }
        self.dependencies.insert(id, dependencies);
        self.order.push(id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &SecureHash) -> bool {
        self.dependencies.contains_key(id)
    }

    /// Nodes that directly depend on `id`.
    pub fn dependents_of(&self, id: &SecureHash) -> BTreeSet<SecureHash> {
        self.dependents.get(id).cloned().unwrap_or_default()
    }

    /// Every node, dependencies first.
    ///
    /// Iterative depth-first traversal: a node is emitted once all of its
    /// known dependencies have been emitted.
    pub fn complete(self) -> Vec<SecureHash> {
        let mut visited: HashSet<SecureHash> = HashSet::with_capacity(self.order.len());
        let mut sorted = Vec::with_capacity(self.order.len());

        for root in &self.order {
            if visited.contains(root) {
                continue;
            }
            visited.insert(*root);
            let mut stack: Vec<(SecureHash, Vec<SecureHash>)> = vec![(*root, self.pending_of(root))];

            loop {
                let next = match stack.last_mut() {
                    Some((_, pending)) => pending.pop(),
                    None => break,
                };
                match next {
                    Some(next) => {
                        if visited.insert(next) {
                            stack.push((next, self.pending_of(&next)));
                        }
                    }
                    None => {
                        if let Some((node, _)) = stack.pop() {
                            sorted.push(node);
                        }
                    }
                }
            }
        }
        sorted
    }

    /// Known dependencies of `id`, in reverse so that popping visits them
    /// in ascending order.
    fn pending_of(&self, id: &SecureHash) -> Vec<SecureHash> {
        self.dependencies
            .get(id)
            .map(|deps| deps.iter().rev().filter(|d| self.dependencies.contains_key(d)).copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn h(n: u8) -> SecureHash {
        SecureHash([n; 32])
    }

    fn deps(ids: &[u8]) -> BTreeSet<SecureHash> {
        ids.iter().map(|n| h(*n)).collect()
    }

    #[test]
    fn test_sorts_example_graph() {
        let mut sort = TopologicalSort::new();
        sort.add(h(3), deps(&[1, 2])).unwrap();
        sort.add(h(2), deps(&[1])).unwrap();
        sort.add(h(1), deps(&[])).unwrap();

        assert_eq!(sort.complete(), vec![h(1), h(2), h(3)]);
    }

    #[test]
    fn test_unknown_dependencies_are_ignored() {
        let mut sort = TopologicalSort::new();
        sort.add(h(2), deps(&[1, 9])).unwrap();
        sort.add(h(1), deps(&[8])).unwrap();

        assert_eq!(sort.complete(), vec![h(1), h(2)]);
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let mut sort = TopologicalSort::new();
        sort.add(h(1), deps(&[])).unwrap();
        assert_eq!(sort.add(h(1), deps(&[])), Err(ResolutionError::DuplicateNode(h(1))));
    }

    #[test]
    fn test_forward_adjacency_tracks_dependents() {
        let mut sort = TopologicalSort::new();
        sort.add(h(2), deps(&[1])).unwrap();
        sort.add(h(3), deps(&[1])).unwrap();

        assert_eq!(sort.dependents_of(&h(1)), deps(&[2, 3]));
        assert!(sort.dependents_of(&h(3)).is_empty());
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut sort = TopologicalSort::new();
        let ids: Vec<SecureHash> = (0..20_000u32).map(|i| SecureHash::sha256(&i.to_le_bytes())).collect();
        for (i, id) in ids.iter().enumerate().rev() {
            let d = if i == 0 { BTreeSet::new() } else { [ids[i - 1]].into_iter().collect() };
            sort.add(*id, d).unwrap();
        }
        assert_eq!(sort.complete(), ids);
    }

    /// Random DAG: node `i` may depend only on nodes `< i`.
    fn dag() -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
        (1usize..40).prop_flat_map(|n| {
            (0..n)
                .map(|i| proptest::collection::btree_set(0..i.max(1), 0..i.min(5) + 1))
                .collect::<Vec<_>>()
                .prop_map(|sets| {
                    sets.into_iter()
                        .enumerate()
                        .map(|(i, s)| s.into_iter().filter(|d| *d < i).collect())
                        .collect()
                })
        })
    }

    proptest! {
        #[test]
        fn prop_dependencies_precede_dependents(graph in dag(), seed in any::<u64>()) {
            let id = |i: usize| SecureHash::sha256(&(i as u64).to_le_bytes());
            let mut insertion: Vec<usize> = (0..graph.len()).collect();
            // Deterministic shuffle driven by the seed.
            let len = insertion.len();
            for i in 0..len {
                let j = ((seed.rotate_left(i as u32) ^ i as u64) % len as u64) as usize;
                insertion.swap(i, j);
            }

            let mut sort = TopologicalSort::new();
            for i in &insertion {
                sort.add(id(*i), graph[*i].iter().map(|d| id(*d)).collect()).unwrap();
            }
            let sorted = sort.complete();
            prop_assert_eq!(sorted.len(), graph.len());

            let position: std::collections::HashMap<SecureHash, usize> =
                sorted.iter().enumerate().map(|(p, h)| (*h, p)).collect();
            for (node, node_deps) in graph.iter().enumerate() {
                for dep in node_deps {
                    prop_assert!(position[&id(*dep)] < position[&id(node)]);
                }
            }
        }
    }
}

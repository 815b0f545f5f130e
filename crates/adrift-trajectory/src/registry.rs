//! Identity registry: stable compact indices for particle identities.
//!
//! The registry maps every particle identity ever observed to a *local
//! index* -- a dense zero-based integer used to address the observation
//! counter table and any other per-particle bookkeeping. Indices are
//! assigned in ascending identity order within a batch, appended after all
//! previously assigned indices, and are never reassigned or reused, even
//! after the underlying particle leaves the simulation.
//!
//! Resolution is split into a pure planning step ([`IdentityRegistry::plan`])
//! and a commit ([`IdentityRegistry::register`]) so that a chunk which fails
//! to persist leaves the registry untouched and a retry sees identical
//! inputs.

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// IndexPlan
// ---------------------------------------------------------------------------

/// Result of resolving a batch of identities against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPlan {
    /// Local index for each input identity, in input order. Identities not
    /// yet registered receive tentative indices starting at the current
    /// registry size, in ascending identity order.
    pub local: Vec<usize>,
    /// Identities that were not yet registered, in ascending order. Commit
    /// them with [`IdentityRegistry::register`] once the chunk is persisted.
    pub new_ids: Vec<i64>,
}

// ---------------------------------------------------------------------------
// IdentityRegistry
// ---------------------------------------------------------------------------

/// Bijective mapping from particle identity to local index.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    local: BTreeMap<i64, usize>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            local: BTreeMap::new(),
        }
    }

    /// Number of distinct identities ever observed (`maxids`).
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// Returns `true` if no identity has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Local index of `id`, if it has been registered.
    pub fn get(&self, id: i64) -> Option<usize> {
        self.local.get(&id).copied()
    }

    /// Returns `true` if `id` has been registered.
    pub fn contains(&self, id: i64) -> bool {
        self.local.contains_key(&id)
    }

    /// Resolve a batch of identities without mutating the registry.
    ///
    /// Known identities map to their existing index. Unknown identities are
    /// assigned tentative indices `len()..len() + new` in ascending identity
    /// order, which is exactly the assignment [`register`](Self::register)
    /// will make, so a plan can be used to assemble a chunk before the
    /// registration is committed.
    pub fn plan(&self, ids: &[i64]) -> IndexPlan {
        let mut new_ids: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| !self.local.contains_key(id))
            .collect();
        new_ids.sort_unstable();
        new_ids.dedup();

        let base = self.local.len();
        let tentative: BTreeMap<i64, usize> = new_ids
            .iter()
            .enumerate()
            .map(|(offset, &id)| (id, base + offset))
            .collect();

        let local = ids
            .iter()
            .map(|id| {
                self.local
                    .get(id)
                    .or_else(|| tentative.get(id))
                    .copied()
                    .expect("every id is either registered or planned")
            })
            .collect();

        IndexPlan { local, new_ids }
    }

    /// Commit a batch of new identities, assigning indices in ascending
    /// identity order starting at the current registry size.
    ///
    /// # Panics
    ///
    /// Panics if `new_ids` is not strictly ascending or contains an identity
    /// that is already registered. Both are contract violations: silent
    /// double registration would corrupt every downstream trajectory.
    pub fn register(&mut self, new_ids: &[i64]) {
        for pair in new_ids.windows(2) {
            assert!(
                pair[0] < pair[1],
                "identity batch must be strictly ascending: {} precedes {}",
                pair[0],
                pair[1]
            );
        }
        for &id in new_ids {
            let index = self.local.len();
            let previous = self.local.insert(id, index);
            assert!(
                previous.is_none(),
                "identity {id} is already registered with local index {}",
                previous.unwrap()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_batch_assigned_in_sorted_order() {
        let mut reg = IdentityRegistry::new();
        let plan = reg.plan(&[30, 10, 20]);
        assert_eq!(plan.new_ids, vec![10, 20, 30]);
        // Input order preserved in `local`, indices follow identity order.
        assert_eq!(plan.local, vec![2, 0, 1]);

        reg.register(&plan.new_ids);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.get(10), Some(0));
        assert_eq!(reg.get(20), Some(1));
        assert_eq!(reg.get(30), Some(2));
    }

    #[test]
    fn later_identities_appended_after_existing() {
        let mut reg = IdentityRegistry::new();
        // A, B, C observed first -> 0, 1, 2.
        reg.register(&[1, 2, 3]);

        // D observed later alongside a re-observation of B.
        let plan = reg.plan(&[2, 4]);
        assert_eq!(plan.new_ids, vec![4]);
        assert_eq!(plan.local, vec![1, 3]);

        reg.register(&plan.new_ids);
        assert_eq!(reg.get(2), Some(1), "existing identity keeps its index");
        assert_eq!(reg.get(4), Some(3));
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn plan_does_not_mutate() {
        let reg = IdentityRegistry::new();
        let _ = reg.plan(&[5, 6]);
        assert!(reg.is_empty());
        // Replanning yields the same tentative assignment.
        let plan = reg.plan(&[6, 5]);
        assert_eq!(plan.new_ids, vec![5, 6]);
        assert_eq!(plan.local, vec![1, 0]);
    }

    #[test]
    fn plan_deduplicates_repeated_ids() {
        let reg = IdentityRegistry::new();
        let plan = reg.plan(&[8, 8, 3]);
        assert_eq!(plan.new_ids, vec![3, 8]);
        assert_eq!(plan.local, vec![1, 1, 0]);
    }

    #[test]
    fn bijection_over_many_batches() {
        let mut reg = IdentityRegistry::new();
        for batch in [[100i64, 50].as_slice(), &[75], &[25, 200]] {
            let plan = reg.plan(batch);
            reg.register(&plan.new_ids);
        }
        let mut seen = std::collections::BTreeSet::new();
        for id in [100, 50, 75, 25, 200] {
            let idx = reg.get(id).unwrap();
            assert!(seen.insert(idx), "index {idx} assigned twice");
            assert!(idx < reg.len());
        }
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn double_registration_panics() {
        let mut reg = IdentityRegistry::new();
        reg.register(&[7]);
        reg.register(&[7]);
    }

    #[test]
    #[should_panic(expected = "strictly ascending")]
    fn unsorted_batch_panics() {
        let mut reg = IdentityRegistry::new();
        reg.register(&[9, 4]);
    }
}

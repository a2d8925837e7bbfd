use atropos_types::ValidatorId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable, stake-weighted membership for a single epoch.
///
/// Validators are kept in a stable order (descending stake, ties broken by
/// id) and assigned a dense 0-based slot used to index vector-clock arrays
/// in [`crate::vector_index::VectorIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSet {
    /// Validators in stable order; position in this vec is the slot.
    ordered: Vec<ValidatorId>,
    stakes: HashMap<ValidatorId, u64>,
    slots: HashMap<ValidatorId, usize>,
    total: u64,
    quorum: u64,
}

impl ValidatorSet {
    /// Build a set from `(id, stake)` pairs. Order is normalized internally;
    /// callers don't need to pre-sort.
    pub fn new(members: impl IntoIterator<Item = (ValidatorId, u64)>) -> Self {
        let mut ordered: Vec<(ValidatorId, u64)> = members.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let total: u64 = ordered.iter().map(|(_, s)| s).sum();
        let quorum = 2 * total / 3 + 1;

        let mut stakes = HashMap::with_capacity(ordered.len());
        let mut slots = HashMap::with_capacity(ordered.len());
        let mut ids = Vec::with_capacity(ordered.len());
        for (slot, (id, stake)) in ordered.iter().enumerate() {
            stakes.insert(*id, *stake);
            slots.insert(*id, slot);
            ids.push(*id);
        }

        Self {
            ordered: ids,
            stakes,
            slots,
            total,
            quorum,
        }
    }

    /// Validator ids in stable canonical order.
    pub fn ids(&self) -> &[ValidatorId] {
        &self.ordered
    }

    pub fn stake(&self, id: ValidatorId) -> u64 {
        self.stakes.get(&id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Minimum stake exceeding 2/3 of total: `floor(2*total/3) + 1`.
    pub fn quorum(&self) -> u64 {
        self.quorum
    }

    /// Dense 0-based slot for a validator, used to index vector-clock arrays.
    pub fn index(&self, id: ValidatorId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn contains(&self, id: ValidatorId) -> bool {
        self.slots.contains_key(&id)
    }
}

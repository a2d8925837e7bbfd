use crate::validator_set::ValidatorSet;
use atropos_types::{EventId, RawTimestamp, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifies one fork chain of a creator. Equal to `creator`'s branch
/// counter at the time the chain's first event was observed; a creator
/// with more than one `BranchId` on record is a cheater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchId(u64);

/// One slot of a `highestBefore` vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// No event by this validator has been observed yet.
    None,
    /// This validator has been seen forking; the slot no longer names a
    /// single coherent branch.
    ForkDetected,
    /// The highest-sequence event of one branch of this validator that is
    /// transitively observed.
    Seen {
        branch: BranchId,
        seq: u64,
        time: RawTimestamp,
        /// The validator's own event carrying this (branch, seq) pair;
        /// used by `forkless_cause` to test transitive inclusion.
        witness: EventId,
    },
}

/// Per-event `highestBefore` vectors and the bookkeeping needed to detect
/// forks and evaluate the forkless-cause predicate.
///
/// Storage is append-only: once an event's vector is computed it is never
/// mutated, matching the core's single-writer concurrency model.
pub struct VectorIndex {
    slots: usize,
    highest_before: HashMap<EventId, Vec<Record>>,
    /// Branch assigned to each event by its own creator, i.e. the branch an
    /// event belongs to (not the branches it observes).
    own_branch: HashMap<EventId, BranchId>,
    own_seq: HashMap<EventId, u64>,
    /// Validator slot of each event's own creator, for forkless-cause
    /// lookups into another event's `highestBefore` vector.
    own_slot: HashMap<EventId, usize>,
    /// Known branch heads (seq == 1 events) per creator, in the order
    /// observed. More than one head means the creator is a cheater.
    branch_heads: HashMap<ValidatorId, Vec<(EventId, BranchId)>>,
    next_branch_id: u64,
}

impl VectorIndex {
    pub fn new(validators: &ValidatorSet) -> Self {
        Self {
            slots: validators.len(),
            highest_before: HashMap::new(),
            own_branch: HashMap::new(),
            own_seq: HashMap::new(),
            own_slot: HashMap::new(),
            branch_heads: HashMap::new(),
            next_branch_id: 0,
        }
    }

    /// Snapshot-friendly copy of all internal maps, for `Engine::snapshot`.
    pub fn export(&self) -> VectorIndexSnapshot {
        VectorIndexSnapshot {
            slots: self.slots,
            highest_before: self.highest_before.clone(),
            own_branch: self.own_branch.clone(),
            own_seq: self.own_seq.clone(),
            own_slot: self.own_slot.clone(),
            branch_heads: self.branch_heads.clone(),
            next_branch_id: self.next_branch_id,
        }
    }

    pub fn import(snapshot: VectorIndexSnapshot) -> Self {
        Self {
            slots: snapshot.slots,
            highest_before: snapshot.highest_before,
            own_branch: snapshot.own_branch,
            own_seq: snapshot.own_seq,
            own_slot: snapshot.own_slot,
            branch_heads: snapshot.branch_heads,
            next_branch_id: snapshot.next_branch_id,
        }
    }

    fn fresh_branch_id(&mut self) -> BranchId {
        let id = BranchId(self.next_branch_id);
        self.next_branch_id += 1;
        id
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.highest_before.contains_key(&id)
    }

    pub fn highest_before(&self, id: EventId) -> Option<&[Record]> {
        self.highest_before.get(&id).map(|v| v.as_slice())
    }

    /// A creator is a cheater once the index has observed more than one
    /// branch head (first event) for them.
    pub fn is_cheater(&self, creator: ValidatorId) -> bool {
        self.branch_heads
            .get(&creator)
            .is_some_and(|heads| heads.len() > 1)
    }

    pub fn cheaters(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.branch_heads
            .iter()
            .filter(|(_, heads)| heads.len() > 1)
            .map(|(v, _)| *v)
    }

    /// Determine (and register, if new) the branch an event with the given
    /// creator/seq/self-parent belongs to.
    fn branch_of(
        &mut self,
        validators: &ValidatorSet,
        creator: ValidatorId,
        event: EventId,
        seq: u64,
        self_parent: Option<EventId>,
    ) -> BranchId {
        if seq <= 1 {
            let heads = self.branch_heads.entry(creator).or_default();
            let branch = self.fresh_branch_id();
            heads.push((event, branch));
            let _ = validators;
            return branch;
        }

        // Non-first event: inherit the self-parent's branch. A missing or
        // unknown self-parent for seq > 1 is a caller contract violation
        // (FrameAssigner rejects INVALID_SEQ before this is reached).
        self_parent
            .and_then(|sp| self.own_branch.get(&sp).copied())
            .unwrap_or_else(|| {
                let heads = self.branch_heads.entry(creator).or_default();
                let branch = self.fresh_branch_id();
                heads.push((event, branch));
                branch
            })
    }

    /// Merge parents' vectors and overlay `event` itself at its creator's
    /// slot. Caller must have already validated lamport/seq and ensured all
    /// parents are present in this index.
    pub fn add(
        &mut self,
        validators: &ValidatorSet,
        event: EventId,
        creator: ValidatorId,
        seq: u64,
        time: RawTimestamp,
        parents: &[EventId],
        self_parent: Option<EventId>,
    ) {
        let mut merged = vec![Record::None; self.slots];

        for parent in parents {
            let Some(parent_vec) = self.highest_before.get(parent) else {
                continue;
            };
            for (slot, rec) in parent_vec.iter().enumerate() {
                merged[slot] = Self::merge_slot(merged[slot], *rec);
            }
        }

        let branch = self.branch_of(validators, creator, event, seq, self_parent);

        if let Some(slot) = validators.index(creator) {
            let overlay = Record::Seen {
                branch,
                seq,
                time,
                witness: event,
            };
            merged[slot] = match merged[slot] {
                Record::ForkDetected => Record::ForkDetected,
                Record::Seen { branch: b, .. } if b != branch => Record::ForkDetected,
                _ => overlay,
            };
        }

        self.own_branch.insert(event, branch);
        self.own_seq.insert(event, seq);
        if let Some(slot) = validators.index(creator) {
            self.own_slot.insert(event, slot);
        }
        self.highest_before.insert(event, merged);
    }

    fn merge_slot(a: Record, b: Record) -> Record {
        match (a, b) {
            (Record::ForkDetected, _) | (_, Record::ForkDetected) => Record::ForkDetected,
            (Record::None, other) | (other, Record::None) => other,
            (
                Record::Seen {
                    branch: ba,
                    seq: sa,
                    ..
                },
                Record::Seen {
                    branch: bb,
                    seq: sb,
                    ..
                },
            ) => {
                if ba != bb {
                    Record::ForkDetected
                } else if sa >= sb {
                    a
                } else {
                    b
                }
            }
        }
    }

    /// Does `a`'s highest-known event from the validator at `slot` (its
    /// witness) itself transitively observe `b`?
    ///
    /// This is a two-hop lookup: `hb_a[slot]` names `v`'s witness event as
    /// seen by `a`, not `b` directly, so whether that witness includes `b`
    /// has to be answered by the witness's own `highestBefore` vector, read
    /// at `b`'s creator's slot.
    fn observes_via(&self, hb_a: &[Record], slot: usize, b: EventId) -> bool {
        let Some(Record::Seen { witness, .. }) = hb_a.get(slot) else {
            return false;
        };
        if *witness == b {
            return true;
        }
        let (Some(b_branch), Some(b_seq), Some(b_slot)) = (
            self.own_branch.get(&b),
            self.own_seq.get(&b),
            self.own_slot.get(&b),
        ) else {
            return false;
        };
        let Some(hb_witness) = self.highest_before.get(witness) else {
            return false;
        };
        matches!(
            hb_witness.get(*b_slot),
            Some(Record::Seen { branch, seq, .. }) if branch == b_branch && seq >= b_seq
        )
    }

    /// True iff a supermajority-by-stake of validators has an event
    /// observed-by `a` that transitively includes `b`, and that validator
    /// is not `ForkDetected` in `a`'s vector.
    pub fn forkless_cause(&self, validators: &ValidatorSet, a: EventId, b: EventId) -> bool {
        if a == b {
            return true;
        }
        let Some(hb_a) = self.highest_before.get(&a) else {
            return false;
        };

        let mut stake = 0u64;
        for v in validators.ids() {
            let Some(slot) = validators.index(*v) else {
                continue;
            };
            if self.observes_via(hb_a, slot, b) {
                stake += validators.stake(*v);
            }
        }
        stake >= validators.quorum()
    }

    /// Stake-weighted median of claimed times across `e`'s `highestBefore`
    /// vector; `0` stands in for `None`/`ForkDetected` slots.
    pub fn median_time(&self, validators: &ValidatorSet, e: EventId) -> RawTimestamp {
        let Some(hb) = self.highest_before.get(&e) else {
            return RawTimestamp::ZERO;
        };

        let mut weighted: Vec<(u64, u64)> = Vec::with_capacity(validators.len());
        for v in validators.ids() {
            let stake = validators.stake(*v);
            let time = match validators.index(*v).and_then(|slot| hb.get(slot)) {
                Some(Record::Seen { time, .. }) => time.get(),
                _ => 0,
            };
            weighted.push((time, stake));
        }
        weighted.sort_by_key(|(time, _)| *time);

        let half = validators.total() / 2;
        let mut cumulative = 0u64;
        for (time, stake) in &weighted {
            cumulative += stake;
            if cumulative > half {
                return RawTimestamp::new(*time);
            }
        }
        weighted
            .last()
            .map(|(time, _)| RawTimestamp::new(*time))
            .unwrap_or(RawTimestamp::ZERO)
    }
}

/// Plain-data mirror of `VectorIndex`'s internal maps, serialized as part
/// of `Engine::snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexSnapshot {
    slots: usize,
    highest_before: HashMap<EventId, Vec<Record>>,
    own_branch: HashMap<EventId, BranchId>,
    own_seq: HashMap<EventId, u64>,
    own_slot: HashMap<EventId, usize>,
    branch_heads: HashMap<ValidatorId, Vec<(EventId, BranchId)>>,
    next_branch_id: u64,
}

use crate::{EventId, ValidatorId};

/// Creator-claimed wall-clock time. Untrusted; the consensus core only
/// ever consumes it through `VectorIndex::median_time`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawTimestamp(pub u64);

impl RawTimestamp {
    pub const ZERO: Self = Self(0);

    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RawTimestamp {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// An immutable DAG node as produced by a validator.
///
/// Events are owned by the host; the core borrows them through
/// `EventSource` and never mutates or persists them itself.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub id: EventId,
    pub epoch: u64,
    pub creator: ValidatorId,
    /// Per-creator sequence number, starting at 1. A second event with the
    /// same `(creator, seq)` is a fork.
    pub seq: u64,
    /// max(parent.lamport) + 1, or 1 if `parents` is empty.
    pub lamport: u64,
    /// Ordered parent ids. If `seq > 1`, the first entry is the self-parent.
    pub parents: Vec<EventId>,
    pub raw_time: RawTimestamp,
}

impl Event {
    /// The previous event by the same creator, if any.
    ///
    /// By convention the self-parent is the first entry in `parents` when
    /// `seq > 1`; a first event (`seq == 1`) has no self-parent even if it
    /// happens to list parents from other creators.
    pub fn self_parent(&self) -> Option<EventId> {
        if self.seq <= 1 {
            return None;
        }
        self.parents.first().copied()
    }

    pub fn is_first_event(&self) -> bool {
        self.seq == 1
    }
}

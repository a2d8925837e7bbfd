use crate::{EventId, RawTimestamp, ValidatorId};

/// A confirmed, totally ordered unit of consensus output.
///
/// Emitted once per decided frame; `events` is the canonical
/// `(lamport, id)` ordering of everything newly causally-before `atropos`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub index: u64,
    pub time: RawTimestamp,
    pub atropos: EventId,
    pub events: Vec<EventId>,
    pub cheaters: Vec<ValidatorId>,
}

impl Block {
    pub fn new(
        index: u64,
        time: RawTimestamp,
        atropos: EventId,
        events: Vec<EventId>,
        cheaters: Vec<ValidatorId>,
    ) -> Self {
        Self {
            index,
            time,
            atropos,
            events,
            cheaters,
        }
    }
}

use crate::validator_set::ValidatorSet;
use crate::vector_index::{Record, VectorIndex};
use atropos_types::{Block, Event, EventId, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Turns an Atropos decision into a confirmed block: walks the atropos's
/// causal past, takes everything not yet emitted, sorts it canonically,
/// and derives cheaters and block time from the vector index.
pub struct Orderer {
    last_decided_frame: u64,
    last_block: u64,
    /// All event ids that have appeared in a previously emitted block.
    ordered: HashSet<EventId>,
}

impl Orderer {
    pub fn new() -> Self {
        Self {
            last_decided_frame: 0,
            last_block: 0,
            ordered: HashSet::new(),
        }
    }

    pub fn last_decided_frame(&self) -> u64 {
        self.last_decided_frame
    }

    pub fn last_block(&self) -> u64 {
        self.last_block
    }

    pub fn export(&self) -> OrdererSnapshot {
        OrdererSnapshot {
            last_decided_frame: self.last_decided_frame,
            last_block: self.last_block,
            ordered: self.ordered.clone(),
        }
    }

    pub fn import(snapshot: OrdererSnapshot) -> Self {
        Self {
            last_decided_frame: snapshot.last_decided_frame,
            last_block: snapshot.last_block,
            ordered: snapshot.ordered,
        }
    }

    /// Build and register the block for a decided `(frame, atropos)` pair.
    /// `fetch` resolves an event's parents and lamport by id; it must
    /// already hold every event causally before `atropos`.
    pub fn confirm(
        &mut self,
        frame: u64,
        atropos: EventId,
        events_by_id: &dyn Fn(EventId) -> Option<Event>,
        vector_index: &VectorIndex,
        validators: &ValidatorSet,
    ) -> Block {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(atropos);
        seen.insert(atropos);

        let mut newly_ordered = Vec::new();
        while let Some(id) = queue.pop_front() {
            if self.ordered.contains(&id) {
                continue;
            }
            let Some(event) = events_by_id(id) else {
                continue;
            };
            newly_ordered.push((id, event.lamport));
            for parent in &event.parents {
                if seen.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }

        newly_ordered.sort_by(|(id_a, lamport_a), (id_b, lamport_b)| {
            lamport_a.cmp(lamport_b).then_with(|| id_a.cmp(id_b))
        });

        let events: Vec<EventId> = newly_ordered.into_iter().map(|(id, _)| id).collect();
        for id in &events {
            self.ordered.insert(*id);
        }

        let cheaters: Vec<ValidatorId> = match vector_index.highest_before(atropos) {
            Some(hb) => validators
                .ids()
                .iter()
                .filter(|v| {
                    validators
                        .index(**v)
                        .and_then(|slot| hb.get(slot))
                        .is_some_and(|r| matches!(r, Record::ForkDetected))
                })
                .copied()
                .collect(),
            None => Vec::new(),
        };

        let time = vector_index.median_time(validators, atropos);

        self.last_decided_frame = frame;
        self.last_block += 1;

        Block::new(self.last_block, time, atropos, events, cheaters)
    }
}

impl Default for Orderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-data mirror of `Orderer`'s bookkeeping, serialized as part of
/// `Engine::snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdererSnapshot {
    last_decided_frame: u64,
    last_block: u64,
    ordered: HashSet<EventId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use atropos_types::RawTimestamp;
    use std::collections::HashMap;

    fn vid(n: u32) -> ValidatorId {
        ValidatorId::new(n)
    }

    fn eid(s: &str) -> EventId {
        EventId::compute(s.as_bytes())
    }

    #[test]
    fn confirm_orders_causal_past_and_bumps_block_index() {
        let vs = ValidatorSet::new([(vid(1), 1), (vid(2), 1)]);
        let mut vi = VectorIndex::new(&vs);

        let a0 = eid("a0");
        let b0 = eid("b0");
        vi.add(&vs, a0, vid(1), 1, RawTimestamp::new(1), &[], None);
        vi.add(&vs, b0, vid(2), 1, RawTimestamp::new(2), &[], None);

        let mut store = HashMap::new();
        store.insert(
            a0,
            Event {
                id: a0,
                epoch: 1,
                creator: vid(1),
                seq: 1,
                lamport: 1,
                parents: vec![],
                raw_time: RawTimestamp::new(1),
            },
        );
        store.insert(
            b0,
            Event {
                id: b0,
                epoch: 1,
                creator: vid(2),
                seq: 1,
                lamport: 1,
                parents: vec![a0],
                raw_time: RawTimestamp::new(2),
            },
        );

        let mut orderer = Orderer::new();
        let block = orderer.confirm(0, b0, &|id| store.get(&id).cloned(), &vi, &vs);

        assert_eq!(block.index, 1);
        assert_eq!(block.atropos, b0);
        assert_eq!(block.events, vec![a0, b0]);
        assert!(block.cheaters.is_empty());
        assert_eq!(orderer.last_block(), 1);
        assert_eq!(orderer.last_decided_frame(), 0);
    }

    #[test]
    fn confirm_lists_forked_validators_as_cheaters() {
        let vs = ValidatorSet::new([(vid(1), 1), (vid(2), 1)]);
        let mut vi = VectorIndex::new(&vs);

        let a0 = eid("a0");
        let a0_prime = eid("a0-prime");
        vi.add(&vs, a0, vid(1), 1, RawTimestamp::new(1), &[], None);
        vi.add(&vs, a0_prime, vid(1), 1, RawTimestamp::new(1), &[], None);

        let b0 = eid("b0");
        vi.add(
            &vs,
            b0,
            vid(2),
            1,
            RawTimestamp::new(2),
            &[a0, a0_prime],
            None,
        );

        let mut store = HashMap::new();
        for (id, creator, parents) in [
            (a0, vid(1), vec![]),
            (a0_prime, vid(1), vec![]),
            (b0, vid(2), vec![a0, a0_prime]),
        ] {
            store.insert(
                id,
                Event {
                    id,
                    epoch: 1,
                    creator,
                    seq: 1,
                    lamport: 1,
                    parents,
                    raw_time: RawTimestamp::new(1),
                },
            );
        }

        let mut orderer = Orderer::new();
        let block = orderer.confirm(1, b0, &|id| store.get(&id).cloned(), &vi, &vs);

        assert_eq!(block.cheaters, vec![vid(1)]);
    }
}

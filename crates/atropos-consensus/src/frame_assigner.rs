use crate::election::{Election, ElectionSnapshot, ElectionResult};
use crate::validator_set::ValidatorSet;
use crate::vector_index::VectorIndex;
use atropos_types::{EventId, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Assigns frames and root status to incoming events and drives the
/// virtual-voting election whenever a new root appears.
pub struct FrameAssigner {
    frame_roots: HashMap<u64, Vec<(EventId, ValidatorId)>>,
    /// Frame assigned to every classified event, root or not; parents need
    /// this to compute their children's frames.
    event_frame: HashMap<EventId, u64>,
    election: Election,
    /// Creators with at least one event recorded in this epoch, used to
    /// detect "creator's first event" roots.
    known_creators: HashSet<ValidatorId>,
}

impl FrameAssigner {
    pub fn new() -> Self {
        Self {
            frame_roots: HashMap::new(),
            event_frame: HashMap::new(),
            election: Election::new(1),
            known_creators: HashSet::new(),
        }
    }

    pub fn export(&self) -> FrameAssignerSnapshot {
        FrameAssignerSnapshot {
            frame_roots: self.frame_roots.clone(),
            event_frame: self.event_frame.clone(),
            election: self.election.export(),
            known_creators: self.known_creators.clone(),
        }
    }

    pub fn import(snapshot: FrameAssignerSnapshot) -> Self {
        Self {
            frame_roots: snapshot.frame_roots,
            event_frame: snapshot.event_frame,
            election: Election::import(snapshot.election),
            known_creators: snapshot.known_creators,
        }
    }

    pub fn roots_at(&self, frame: u64) -> &[(EventId, ValidatorId)] {
        self.frame_roots.get(&frame).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn frame_of(&self, event: EventId) -> Option<u64> {
        self.event_frame.get(&event).copied()
    }

    pub fn deciding_frame(&self) -> u64 {
        self.election.deciding_frame()
    }

    /// Compute `e`'s frame, whether it is a root, and advance the election
    /// if so. `parent_frames` must already reflect the frames of `e`'s
    /// parents (empty for a creator's first event). Returns the frame, the
    /// root flag, and an election decision if registering this root just
    /// completed one.
    pub fn classify(
        &mut self,
        event: EventId,
        creator: ValidatorId,
        parent_frames: &[u64],
        vector_index: &VectorIndex,
        validators: &ValidatorSet,
    ) -> (u64, bool, Option<ElectionResult>) {
        let is_first_event = self.known_creators.insert(creator);

        if is_first_event {
            self.event_frame.insert(event, 1);
            let decision = self.register_root(event, 1, creator, vector_index, validators);
            return (1, true, decision);
        }

        let base_frame = parent_frames.iter().copied().max().unwrap_or(1);
        let mut frame = base_frame;

        // Promote iteratively while e forkless-causes a quorum of the
        // current frame's roots.
        loop {
            let roots = self.roots_at(frame);
            let stake: u64 = roots
                .iter()
                .filter(|(root_id, _)| vector_index.forkless_cause(validators, event, *root_id))
                .map(|(_, creator)| validators.stake(*creator))
                .sum();

            if stake >= validators.quorum() {
                frame += 1;
            } else {
                break;
            }
        }

        let is_root = frame > base_frame;
        self.event_frame.insert(event, frame);
        let decision = if is_root {
            self.register_root(event, frame, creator, vector_index, validators)
        } else {
            None
        };
        (frame, is_root, decision)
    }

    fn register_root(
        &mut self,
        event: EventId,
        frame: u64,
        creator: ValidatorId,
        vector_index: &VectorIndex,
        validators: &ValidatorSet,
    ) -> Option<ElectionResult> {
        self.frame_roots.entry(frame).or_default().push((event, creator));
        let result =
            self.election
                .process_root(event, frame, &self.frame_roots, vector_index, validators);
        if let Some(result) = result {
            self.election = Election::new(result.frame + 1);
        }
        result
    }
}

impl Default for FrameAssigner {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-data mirror of `FrameAssigner`'s tables, serialized as part of
/// `Engine::snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameAssignerSnapshot {
    frame_roots: HashMap<u64, Vec<(EventId, ValidatorId)>>,
    event_frame: HashMap<EventId, u64>,
    election: ElectionSnapshot,
    known_creators: HashSet<ValidatorId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid(n: u32) -> ValidatorId {
        ValidatorId::new(n)
    }

    fn eid(s: &str) -> EventId {
        EventId::compute(s.as_bytes())
    }

    #[test]
    fn first_event_is_frame_one_root() {
        let vs = ValidatorSet::new([(vid(1), 1), (vid(2), 1), (vid(3), 1), (vid(4), 1)]);
        let vi = VectorIndex::new(&vs);
        let mut fa = FrameAssigner::new();
        let (frame, is_root, decision) = fa.classify(eid("a0"), vid(1), &[], &vi, &vs);
        assert!(decision.is_none());
        assert_eq!(frame, 1);
        assert!(is_root);
        assert_eq!(fa.roots_at(1).len(), 1);
    }
}

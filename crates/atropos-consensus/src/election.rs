use crate::validator_set::ValidatorSet;
use crate::vector_index::VectorIndex;
use atropos_types::{EventId, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A validator's vote on whether it observes a frame-`D` root (and which
/// one) as cast or aggregated by a later root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Vote {
    yes: bool,
    /// The frame-`D` root this vote observed, when `yes`.
    seen_root: Option<EventId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Decision {
    yes: bool,
    atropos_candidate: Option<EventId>,
}

/// Outcome of a root being processed: either the frame remains undecided,
/// or an Atropos has just been selected for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectionResult {
    pub frame: u64,
    pub atropos: EventId,
}

/// Abstracts the forkless-cause predicate `Election` votes against, so it
/// can be driven by a real `VectorIndex` in the engine and by a hand-picked
/// fake in tests, the way `abft/election/election_test.go` fakes
/// `forklessCause` with direct edges instead of a real vector clock.
pub trait ForklessCause {
    fn forkless_cause(&self, validators: &ValidatorSet, a: EventId, b: EventId) -> bool;
}

impl ForklessCause for VectorIndex {
    fn forkless_cause(&self, validators: &ValidatorSet, a: EventId, b: EventId) -> bool {
        VectorIndex::forkless_cause(self, validators, a, b)
    }
}

/// Virtual-voting state for the frame currently being decided.
///
/// One `Election` instance decides a single frame and is then replaced
/// (its roots table carried forward) to decide the next frame, mirroring
/// the reset described for decision emission.
pub struct Election {
    /// Frame this instance is deciding.
    deciding_frame: u64,
    /// `(voter root, subject validator) -> Vote`, keyed per voting round.
    votes: HashMap<(EventId, ValidatorId), Vote>,
    decided: HashMap<ValidatorId, Decision>,
}

impl Election {
    pub fn new(deciding_frame: u64) -> Self {
        Self {
            deciding_frame,
            votes: HashMap::new(),
            decided: HashMap::new(),
        }
    }

    pub fn deciding_frame(&self) -> u64 {
        self.deciding_frame
    }

    pub fn export(&self) -> ElectionSnapshot {
        ElectionSnapshot {
            deciding_frame: self.deciding_frame,
            votes: self.votes.clone(),
            decided: self.decided.clone(),
        }
    }

    pub fn import(snapshot: ElectionSnapshot) -> Self {
        Self {
            deciding_frame: snapshot.deciding_frame,
            votes: snapshot.votes,
            decided: snapshot.decided,
        }
    }

    fn all_decided(&self, validators: &ValidatorSet) -> bool {
        validators.ids().iter().all(|v| self.decided.contains_key(v))
    }

    /// Process a newly classified root `r` at frame `r_frame`. `frame_roots`
    /// supplies the roots recorded for each frame so far (including `r`'s
    /// own frame and the prior one).
    ///
    /// Returns `Some(result)` once every validator is decided and at least
    /// one decided `yes`; the caller must then start a new `Election` for
    /// `result.frame + 1`, carrying the roots table forward.
    pub fn process_root<V: ForklessCause>(
        &mut self,
        r: EventId,
        r_frame: u64,
        frame_roots: &HashMap<u64, Vec<(EventId, ValidatorId)>>,
        vector_index: &V,
        validators: &ValidatorSet,
    ) -> Option<ElectionResult> {
        let d = self.deciding_frame;
        if r_frame <= d {
            return None;
        }

        let empty = Vec::new();
        for &subject in validators.ids() {
            if self.decided.contains_key(&subject) {
                continue;
            }

            if r_frame == d + 1 {
                let roots_at_d = frame_roots.get(&d).unwrap_or(&empty);
                let seen_root = roots_at_d
                    .iter()
                    .find(|(root_id, creator)| {
                        *creator == subject && vector_index.forkless_cause(validators, r, *root_id)
                    })
                    .map(|(root_id, _)| *root_id);

                self.votes.insert(
                    (r, subject),
                    Vote {
                        yes: seen_root.is_some(),
                        seen_root,
                    },
                );
            } else {
                let prior_roots = frame_roots.get(&(r_frame - 1)).unwrap_or(&empty);
                let mut yes_stake = 0u64;
                let mut no_stake = 0u64;
                let mut yes_candidate: Option<EventId> = None;

                for (root_id, root_creator) in prior_roots {
                    if !vector_index.forkless_cause(validators, r, *root_id) {
                        continue;
                    }
                    let Some(vote) = self.votes.get(&(*root_id, subject)) else {
                        continue;
                    };
                    let stake = validators.stake(*root_creator);
                    if vote.yes {
                        yes_stake += stake;
                        if yes_candidate.is_none() {
                            yes_candidate = vote.seen_root;
                        }
                    } else {
                        no_stake += stake;
                    }
                }

                let yes = yes_stake >= no_stake;
                self.votes.insert(
                    (r, subject),
                    Vote {
                        yes,
                        seen_root: if yes { yes_candidate } else { None },
                    },
                );

                let winning_stake = if yes { yes_stake } else { no_stake };
                if winning_stake >= validators.quorum() {
                    self.decided.insert(
                        subject,
                        Decision {
                            yes,
                            atropos_candidate: if yes { yes_candidate } else { None },
                        },
                    );
                }
            }
        }

        if !self.all_decided(validators) {
            return None;
        }

        let winner = validators
            .ids()
            .iter()
            .filter_map(|v| {
                let decision = self.decided.get(v)?;
                if decision.yes {
                    decision.atropos_candidate.map(|atropos| (*v, atropos))
                } else {
                    None
                }
            })
            .min_by(|(va, aa), (vb, ab)| {
                validators
                    .index(*va)
                    .cmp(&validators.index(*vb))
                    .then_with(|| aa.cmp(ab))
            });

        match winner {
            Some((_, atropos)) => Some(ElectionResult { frame: d, atropos }),
            None => {
                // Every validator decided "no": frame `d` has no Atropos.
                // Move on to deciding `d + 1` with a clean ballot; the
                // caller keeps the roots table, so the round-1 votes this
                // next round casts still see every root recorded so far.
                self.deciding_frame = d + 1;
                self.votes.clear();
                self.decided.clear();
                None
            }
        }
    }
}

/// Plain-data mirror of `Election`'s vote tables, serialized as part of
/// `Engine::snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSnapshot {
    deciding_frame: u64,
    votes: HashMap<(EventId, ValidatorId), Vote>,
    decided: HashMap<ValidatorId, Decision>,
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
    fn new_election_starts_undecided() {
        let election = Election::new(0);
        assert_eq!(election.deciding_frame(), 0);
        assert!(election.decided.is_empty());
    }

    #[test]
    fn ignores_roots_at_or_below_deciding_frame() {
        let vs = ValidatorSet::new([(vid(1), 1), (vid(2), 1), (vid(3), 1), (vid(4), 1)]);
        let vi = VectorIndex::new(&vs);
        let mut election = Election::new(1);
        let roots = HashMap::new();
        let result = election.process_root(eid("r"), 1, &roots, &vi, &vs);
        assert!(result.is_none());
    }

    /// A forkless-cause oracle driven by a fixed edge set instead of a real
    /// vector clock, mirroring how `abft/election/election_test.go` fakes
    /// the predicate to exercise voting/decision logic in isolation.
    struct FakeOracle {
        edges: std::collections::HashSet<(EventId, EventId)>,
    }

    impl FakeOracle {
        fn new(edges: &[(EventId, EventId)]) -> Self {
            Self {
                edges: edges.iter().copied().collect(),
            }
        }
    }

    impl ForklessCause for FakeOracle {
        fn forkless_cause(&self, _validators: &ValidatorSet, a: EventId, b: EventId) -> bool {
            a == b || self.edges.contains(&(a, b))
        }
    }

    #[test]
    fn decides_atropos_via_two_round_virtual_vote() {
        let vs = ValidatorSet::new([(vid(1), 1), (vid(2), 1), (vid(3), 1), (vid(4), 1)]);

        let a0 = eid("a0");
        let b0 = eid("b0");
        let c0 = eid("c0");
        let d0 = eid("d0");
        let a1 = eid("a1");
        let b1 = eid("b1");
        let c1 = eid("c1");
        let e2 = eid("e2");

        // Round 1 (frame-2) roots: a1 and b1 each see b0 and c0 but not
        // their own creator's root or d0; c1 sees the same. v4 never
        // produces a frame-2 root, so it never gets a "yes" vote cast.
        let oracle = FakeOracle::new(&[
            (a1, b0),
            (a1, c0),
            (b1, b0),
            (b1, c0),
            (c1, b0),
            (c1, c0),
            // Round 2 (frame-3) root aggregates all three frame-2 roots.
            (e2, a1),
            (e2, b1),
            (e2, c1),
        ]);

        let mut frame_roots: HashMap<u64, Vec<(EventId, ValidatorId)>> = HashMap::new();
        frame_roots.insert(
            1,
            vec![(a0, vid(1)), (b0, vid(2)), (c0, vid(3)), (d0, vid(4))],
        );
        frame_roots.insert(2, vec![(a1, vid(1)), (b1, vid(2)), (c1, vid(3))]);

        let mut election = Election::new(1);
        assert!(election
            .process_root(a1, 2, &frame_roots, &oracle, &vs)
            .is_none());
        assert!(election
            .process_root(b1, 2, &frame_roots, &oracle, &vs)
            .is_none());
        assert!(election
            .process_root(c1, 2, &frame_roots, &oracle, &vs)
            .is_none());

        let result = election
            .process_root(e2, 3, &frame_roots, &oracle, &vs)
            .expect("quorum reached on every subject");

        assert_eq!(result.frame, 1);
        assert_eq!(result.atropos, b0);
    }

    #[test]
    fn all_no_decision_advances_to_the_next_frame_instead_of_stalling() {
        let vs = ValidatorSet::new([(vid(1), 1), (vid(2), 1), (vid(3), 1), (vid(4), 1)]);

        let a0 = eid("a0");
        let b0 = eid("b0");
        let c0 = eid("c0");
        let d0 = eid("d0");
        let a1 = eid("a1");
        let b1 = eid("b1");
        let c1 = eid("c1");
        let e2 = eid("e2");

        // No frame-2 root sees any frame-1 root, so every subject decides
        // "no" once the aggregating round runs.
        let oracle = FakeOracle::new(&[(e2, a1), (e2, b1), (e2, c1)]);

        let mut frame_roots: HashMap<u64, Vec<(EventId, ValidatorId)>> = HashMap::new();
        frame_roots.insert(
            1,
            vec![(a0, vid(1)), (b0, vid(2)), (c0, vid(3)), (d0, vid(4))],
        );
        frame_roots.insert(2, vec![(a1, vid(1)), (b1, vid(2)), (c1, vid(3))]);

        let mut election = Election::new(1);
        election.process_root(a1, 2, &frame_roots, &oracle, &vs);
        election.process_root(b1, 2, &frame_roots, &oracle, &vs);
        election.process_root(c1, 2, &frame_roots, &oracle, &vs);

        let result = election.process_root(e2, 3, &frame_roots, &oracle, &vs);
        assert!(result.is_none());
        assert_eq!(election.deciding_frame(), 2);
    }
}

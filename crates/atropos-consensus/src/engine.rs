use crate::error::{EngineError, ProcessOutcome, RejectReason};
use crate::frame_assigner::FrameAssigner;
use crate::orderer::Orderer;
use crate::snapshot::Snapshot;
use crate::traits::{BlockSink, EpochSealPolicy, EventSource, FrameRoots, ValidatorSetSource};
use crate::validator_set::ValidatorSet;
use crate::vector_index::VectorIndex;
use atropos_types::{Event, EventId, ValidatorId};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

struct EpochState {
    epoch: u64,
    validators: ValidatorSet,
    vector_index: VectorIndex,
    frame_assigner: FrameAssigner,
}

impl EpochState {
    fn new(epoch: u64, validators: ValidatorSet) -> Self {
        let vector_index = VectorIndex::new(&validators);
        Self {
            epoch,
            validators,
            vector_index,
            frame_assigner: FrameAssigner::new(),
        }
    }
}

/// Ties `VectorIndex`, `FrameAssigner` and `Orderer` together into the
/// single entry point the host drives with `process_event`.
///
/// Mutating entry points (`process_event`, `bootstrap`) are expected to be
/// called from one logical task at a time ("engine mutex" in the design);
/// the `RwLock` here exists so read-only queries such as
/// `get_vector_index_handle` can run concurrently with each other without
/// requiring the host to serialize those too.
pub struct Engine {
    state: RwLock<EpochState>,
    orderer: RwLock<Orderer>,
    seal_policy: Box<dyn EpochSealPolicy + Send + Sync>,
    next_validators: Box<dyn ValidatorSetSource + Send + Sync>,
    block_sink: Mutex<Box<dyn BlockSink + Send + Sync>>,
}

impl Engine {
    pub fn new(
        epoch: u64,
        validators: ValidatorSet,
        seal_policy: Box<dyn EpochSealPolicy + Send + Sync>,
        next_validators: Box<dyn ValidatorSetSource + Send + Sync>,
        block_sink: Box<dyn BlockSink + Send + Sync>,
    ) -> Self {
        Self {
            state: RwLock::new(EpochState::new(epoch, validators)),
            orderer: RwLock::new(Orderer::new()),
            seal_policy,
            next_validators,
            block_sink: Mutex::new(block_sink),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    pub fn last_decided_frame(&self) -> u64 {
        self.orderer.read().last_decided_frame()
    }

    pub fn last_block(&self) -> u64 {
        self.orderer.read().last_block()
    }

    /// Restore engine state from a previously taken `snapshot()`. Replaces
    /// whatever epoch/vector-index/frame/order state the engine was built
    /// with; call this instead of `Engine::new` when resuming from
    /// host-managed persistence.
    pub fn bootstrap(
        &self,
        snapshot: Snapshot,
    ) -> Result<(), EngineError> {
        let (epoch, validators, frame_assigner, vector_index, orderer) = snapshot.into_parts()?;

        let mut state = self.state.write();
        state.epoch = epoch;
        state.validators = validators;
        state.vector_index = VectorIndex::import(vector_index);
        state.frame_assigner = FrameAssigner::import(frame_assigner);
        *self.orderer.write() = Orderer::import(orderer);
        Ok(())
    }

    /// Opaque, versioned snapshot of current epoch state for host
    /// persistence. Round-trips through `bootstrap`.
    pub fn snapshot(&self) -> Result<Vec<u8>, EngineError> {
        let state = self.state.read();
        let orderer = self.orderer.read();
        let snapshot = Snapshot::new(
            state.epoch,
            state.validators.clone(),
            state.frame_assigner.export(),
            state.vector_index.export(),
            orderer.export(),
        );
        snapshot.encode()
    }

    /// A cloneable read handle for host queries (median time, membership
    /// checks) that don't need to mutate engine state.
    pub fn get_vector_index_handle(&self) -> VectorIndexHandle<'_> {
        VectorIndexHandle { engine: self }
    }

    /// Validate and ingest `event`. `source` must already contain every
    /// parent of `event`; the caller (an upstream ordering buffer) is
    /// responsible for topological delivery.
    pub fn process_event(&self, event: Event, source: &dyn EventSource) -> ProcessOutcome {
        let mut state = self.state.write();

        if state.vector_index.contains(event.id) {
            return ProcessOutcome::Accepted;
        }

        if event.epoch != state.epoch {
            tracing::debug!(
                "rejecting {}: wrong epoch (event {} != current {})",
                event.id,
                event.epoch,
                state.epoch
            );
            return ProcessOutcome::Rejected(RejectReason::WrongEpoch {
                event: event.id,
                event_epoch: event.epoch,
                current_epoch: state.epoch,
            });
        }

        let mut parent_events = Vec::with_capacity(event.parents.len());
        for parent in &event.parents {
            match source.get(*parent) {
                Some(p) if state.vector_index.contains(p.id) => parent_events.push(p),
                _ => {
                    tracing::debug!("rejecting {}: missing parent {}", event.id, parent);
                    return ProcessOutcome::Rejected(RejectReason::MissingParent {
                        event: event.id,
                        parent: *parent,
                    });
                }
            }
        }

        let expected_lamport = parent_events.iter().map(|p| p.lamport).max().map(|m| m + 1).unwrap_or(1);
        if event.lamport != expected_lamport {
            tracing::debug!(
                "rejecting {}: lamport {} != expected {}",
                event.id,
                event.lamport,
                expected_lamport
            );
            return ProcessOutcome::Rejected(RejectReason::InvalidLamport {
                event: event.id,
                expected: expected_lamport,
                got: event.lamport,
            });
        }

        if event.seq > 1 {
            let self_parent = event.self_parent().and_then(|id| source.get(id));
            match self_parent {
                Some(sp) if sp.creator == event.creator && sp.seq + 1 == event.seq => {}
                _ => {
                    tracing::debug!(
                        "rejecting {}: invalid seq {} for creator {}",
                        event.id,
                        event.seq,
                        event.creator
                    );
                    return ProcessOutcome::Rejected(RejectReason::InvalidSeq {
                        event: event.id,
                        creator: event.creator,
                        seq: event.seq,
                    });
                }
            }
        }

        let parent_frames: Vec<u64> = event
            .parents
            .iter()
            .filter_map(|p| state.frame_assigner.frame_of(*p))
            .collect();

        state.vector_index.add(
            &state.validators,
            event.id,
            event.creator,
            event.seq,
            event.raw_time,
            &event.parents,
            event.self_parent(),
        );

        let (frame, is_root, decision) = state.frame_assigner.classify(
            event.id,
            event.creator,
            &parent_frames,
            &state.vector_index,
            &state.validators,
        );
        let _ = is_root;

        let Some(decision) = decision else {
            return ProcessOutcome::Accepted;
        };

        let mut orderer = self.orderer.write();
        let block = orderer.confirm(
            frame,
            decision.atropos,
            &|id| source.get(id),
            &state.vector_index,
            &state.validators,
        );

        tracing::info!(
            "block {} confirmed: frame {}, atropos {}, {} events",
            block.index,
            frame,
            block.atropos,
            block.events.len()
        );
        for cheater in &block.cheaters {
            tracing::warn!("validator {} observed forking in block {}", cheater, block.index);
        }

        self.block_sink.lock().on_block(&block);

        if self.seal_policy.should_seal(&block, &block.cheaters) {
            let next_epoch = state.epoch + 1;
            let next_validators = self.next_validators.validators_for_epoch(next_epoch);
            tracing::info!("sealing epoch {} after block {}", state.epoch, block.index);
            *state = EpochState::new(next_epoch, next_validators);
        }

        ProcessOutcome::AcceptedWithBlocks(vec![block])
    }
}

impl FrameRoots for Engine {
    fn roots_at(&self, frame: u64) -> Vec<(EventId, ValidatorId)> {
        self.state.read().frame_assigner.roots_at(frame).to_vec()
    }
}

/// Read-only view over the current epoch's vector index, for host queries
/// that don't need to mutate engine state.
pub struct VectorIndexHandle<'a> {
    engine: &'a Engine,
}

impl VectorIndexHandle<'_> {
    pub fn median_time(&self, event: EventId) -> atropos_types::RawTimestamp {
        let state = self.engine.state.read();
        state.vector_index.median_time(&state.validators, event)
    }

    pub fn forkless_cause(&self, a: EventId, b: EventId) -> bool {
        let state = self.engine.state.read();
        state.vector_index.forkless_cause(&state.validators, a, b)
    }

    pub fn is_cheater(&self, validator: atropos_types::ValidatorId) -> bool {
        self.engine.state.read().vector_index.is_cheater(validator)
    }
}

pub type SharedEngine = Arc<Engine>;

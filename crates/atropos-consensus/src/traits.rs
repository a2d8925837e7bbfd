use crate::validator_set::ValidatorSet;
use atropos_types::{Block, Event, EventId, ValidatorId};

/// Read-only lookup the host must provide; events are owned externally.
pub trait EventSource {
    fn get(&self, id: EventId) -> Option<Event>;
    fn has(&self, id: EventId) -> bool;
}

/// Post-hoc access to the roots recorded for a frame, backed by the
/// engine's own frame-roots table.
pub trait FrameRoots {
    fn roots_at(&self, frame: u64) -> Vec<(EventId, ValidatorId)>;
}

/// Receives confirmed blocks as they're emitted.
pub trait BlockSink {
    fn on_block(&mut self, block: &Block);
}

/// Host policy for when to seal the current epoch, evaluated after each
/// emitted block.
pub trait EpochSealPolicy {
    fn should_seal(&self, block: &Block, cheaters: &[ValidatorId]) -> bool;
}

/// Supplies the validator set for the epoch that follows a seal. The core
/// never invents membership changes; the host decides them out of band
/// (stake updates, slashing, elections) and hands the result back here.
pub trait ValidatorSetSource {
    fn validators_for_epoch(&self, epoch: u64) -> ValidatorSet;
}

/// An `EpochSealPolicy` that never seals; useful for hosts and tests that
/// manage epoch boundaries out of band.
pub struct NeverSeal;

impl EpochSealPolicy for NeverSeal {
    fn should_seal(&self, _block: &Block, _cheaters: &[ValidatorId]) -> bool {
        false
    }
}

/// A `BlockSink` that discards every block; for hosts and tests that read
/// blocks from `ProcessOutcome` instead.
pub struct NoopBlockSink;

impl BlockSink for NoopBlockSink {
    fn on_block(&mut self, _block: &Block) {}
}

/// Seals after a fixed number of blocks within the current epoch, matching
/// the common "max blocks per epoch" deployment policy.
pub struct SealAfterBlocks {
    pub max_blocks: u64,
    blocks_this_epoch: std::cell::Cell<u64>,
}

impl SealAfterBlocks {
    pub fn new(max_blocks: u64) -> Self {
        Self {
            max_blocks,
            blocks_this_epoch: std::cell::Cell::new(0),
        }
    }
}

impl EpochSealPolicy for SealAfterBlocks {
    fn should_seal(&self, _block: &Block, _cheaters: &[ValidatorId]) -> bool {
        let count = self.blocks_this_epoch.get() + 1;
        if count >= self.max_blocks {
            self.blocks_this_epoch.set(0);
            true
        } else {
            self.blocks_this_epoch.set(count);
            false
        }
    }
}

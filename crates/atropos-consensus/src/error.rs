use atropos_types::{EventId, ValidatorId};
use thiserror::Error;

/// Reasons `process_event` can reject an event. All of these are
/// recoverable by the caller; the one unrecoverable condition
/// (`INTERNAL_INVARIANT` in the design) is a panic, not a variant here,
/// since by definition the engine's own state can no longer be trusted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("parent {parent} of event {event} not found in event source")]
    MissingParent { event: EventId, parent: EventId },

    #[error("event {event} epoch {event_epoch} does not match current epoch {current_epoch}")]
    WrongEpoch {
        event: EventId,
        event_epoch: u64,
        current_epoch: u64,
    },

    #[error(
        "event {event} has lamport {got}, expected {expected} (max(parents.lamport) + 1)"
    )]
    InvalidLamport {
        event: EventId,
        expected: u64,
        got: u64,
    },

    #[error(
        "event {event} has seq {seq} from creator {creator}, which is not contiguous with its branch"
    )]
    InvalidSeq {
        event: EventId,
        creator: ValidatorId,
        seq: u64,
    },
}

/// Top-level error type for engine operations other than event rejection,
/// e.g. malformed snapshots fed to `bootstrap`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("snapshot is malformed: {0}")]
    InvalidSnapshot(String),

    #[error("snapshot version {found} is not supported (expected {expected})")]
    UnsupportedSnapshotVersion { expected: u16, found: u16 },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

/// Outcome of `process_event`. Rejection carries a reason; everything else
/// is success, possibly producing confirmed blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Accepted,
    AcceptedWithBlocks(Vec<atropos_types::Block>),
    Rejected(RejectReason),
}

impl ProcessOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, ProcessOutcome::Rejected(_))
    }
}

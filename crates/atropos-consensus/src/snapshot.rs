use crate::election::ElectionSnapshot;
use crate::frame_assigner::FrameAssignerSnapshot;
use crate::orderer::OrdererSnapshot;
use crate::validator_set::ValidatorSet;
use crate::vector_index::VectorIndexSnapshot;
use crate::EngineError;
use serde::{Deserialize, Serialize};

/// Current on-wire snapshot format version. Bump whenever a field is added
/// or removed; `Engine::bootstrap` rejects anything else.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Self-describing binary snapshot of an `Engine`: everything needed to
/// resume consensus for the current epoch without replaying history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    version: u16,
    epoch: u64,
    validators: ValidatorSet,
    frame_assigner: FrameAssignerSnapshot,
    vector_index: VectorIndexSnapshot,
    orderer: OrdererSnapshot,
}

impl Snapshot {
    pub(crate) fn new(
        epoch: u64,
        validators: ValidatorSet,
        frame_assigner: FrameAssignerSnapshot,
        vector_index: VectorIndexSnapshot,
        orderer: OrdererSnapshot,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            epoch,
            validators,
            frame_assigner,
            vector_index,
            orderer,
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> Result<
        (
            u64,
            ValidatorSet,
            FrameAssignerSnapshot,
            VectorIndexSnapshot,
            OrdererSnapshot,
        ),
        EngineError,
    > {
        if self.version != SNAPSHOT_VERSION {
            return Err(EngineError::UnsupportedSnapshotVersion {
                expected: SNAPSHOT_VERSION,
                found: self.version,
            });
        }
        Ok((
            self.epoch,
            self.validators,
            self.frame_assigner,
            self.vector_index,
            self.orderer,
        ))
    }

    pub fn encode(&self) -> Result<Vec<u8>, EngineError> {
        bincode::serialize(self).map_err(|e| EngineError::InvalidSnapshot(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        bincode::deserialize(bytes).map_err(|e| EngineError::InvalidSnapshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::election::Election;
    use crate::frame_assigner::FrameAssigner;
    use crate::orderer::Orderer;
    use atropos_types::ValidatorId;

    #[test]
    fn rejects_unknown_version() {
        let vs = ValidatorSet::new([(ValidatorId::new(1), 1)]);
        let mut snap = Snapshot::new(
            1,
            vs,
            FrameAssigner::new().export(),
            crate::vector_index::VectorIndex::new(&ValidatorSet::new([(ValidatorId::new(1), 1)]))
                .export(),
            Orderer::new().export(),
        );
        snap.version = SNAPSHOT_VERSION + 1;
        let bytes = bincode::serialize(&snap).unwrap();
        let err = Snapshot::decode(&bytes).unwrap().into_parts().unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedSnapshotVersion { .. }));
        let _ = Election::new(1);
    }
}

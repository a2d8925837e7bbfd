//! Host-tunable engine configuration.
//!
//! Unlike a node binary's config (network, RPC, storage, metrics), the core
//! has exactly two knobs that aren't already part of per-epoch
//! `ValidatorSet` state: how large the upstream ordering buffer is allowed
//! to grow, and how many blocks an epoch runs for under the default seal
//! policy. Everything else is either derived from events or supplied by the
//! host through the trait collaborators in [`crate::traits`].

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the upstream `OrderingBuffer`'s released-id LRU.
    pub ordering_buffer_capacity: usize,
    /// Block count after which `SealAfterBlocks` seals the epoch.
    pub blocks_per_epoch: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ordering_buffer_capacity: 4096,
            blocks_per_epoch: 1000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::InvalidConfig(format!("reading {}: {e}", path.display())))?;
        let config: EngineConfig = toml::from_str(&contents)
            .map_err(|e| EngineError::InvalidConfig(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make the engine unusable.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.ordering_buffer_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "ordering_buffer_capacity must be at least 1".into(),
            ));
        }
        if self.blocks_per_epoch == 0 {
            return Err(EngineError::InvalidConfig(
                "blocks_per_epoch must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

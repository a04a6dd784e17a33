//! State diffs and the client-side replica that applies them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::snapshot::{EntityKey, EntityState};

/// Changes between two snapshot versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    pub version: u64,
    /// Version the diff builds on; 0 means a full snapshot
    pub baseline_version: u64,
    pub tick: u64,
    /// Created or changed entities, in full
    pub entities_changed: Vec<EntityState>,
    /// Tombstones for destroyed entities
    pub entities_removed: Vec<EntityKey>,
}

impl StateDiff {
    pub fn is_full(&self) -> bool {
        self.baseline_version == 0
    }

    pub fn is_empty(&self) -> bool {
        self.entities_changed.is_empty() && self.entities_removed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReplicaError {
    #[error("diff builds on version {baseline} but replica is at {have}")]
    MissingBaseline { baseline: u64, have: u64 },
}

/// Entity set as a client reconstructs it from diffs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientReplica {
    version: u64,
    entities: BTreeMap<EntityKey, EntityState>,
}

impl ClientReplica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn entities(&self) -> &BTreeMap<EntityKey, EntityState> {
        &self.entities
    }

    pub fn get(&self, key: &EntityKey) -> Option<&EntityState> {
        self.entities.get(key)
    }

    /// Apply a diff. Full snapshots replace the replica outright, stale
    /// diffs are ignored. Returns whether anything was applied.
    pub fn apply(&mut self, diff: &StateDiff) -> Result<bool, ReplicaError> {
        if diff.version < self.version || (diff.version == self.version && !diff.is_full()) {
            return Ok(false);
        }

        if diff.is_full() {
            self.entities.clear();
        } else if diff.baseline_version > self.version {
            return Err(ReplicaError::MissingBaseline {
                baseline: diff.baseline_version,
                have: self.version,
            });
        }

        for entity in &diff.entities_changed {
            self.entities.insert(entity.key(), entity.clone());
        }
        for key in &diff.entities_removed {
            self.entities.remove(key);
        }
        self.version = diff.version;
        Ok(true)
    }
}

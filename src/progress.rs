//! Training progress record.
//!
//! Epoch and global-step bookkeeping lives in an explicit record rather
//! than hiding inside the checkpoint file handling, so resumption logic is
//! testable without touching the filesystem. The checkpoint manager owns
//! one of these and persists it.

use serde::{Deserialize, Serialize};

/// How far a training run has progressed.
///
/// `last_epoch` counts completed epochs, which is also the first epoch a
/// resumed run executes. `global_step` counts logged training batches
/// across all (possibly resumed) runs of the same checkpoint directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainProgress {
    /// Number of completed epochs.
    pub last_epoch: usize,
    /// Monotonically increasing batch counter used to key summary events.
    pub global_step: u64,
}

impl TrainProgress {
    /// Fresh progress: nothing completed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the global step counter and return the new value.
    ///
    /// Strictly increasing across every call, including across resumed runs
    /// once the record has been restored from a checkpoint.
    pub fn step(&mut self) -> u64 {
        self.global_step += 1;
        self.global_step
    }

    /// Record that `epochs` epochs are now complete.
    pub fn record_epochs_done(&mut self, epochs: usize) {
        self.last_epoch = epochs;
    }
}

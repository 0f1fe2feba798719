//! Checkpoint management.
//!
//! A checkpoint is a directory holding everything a resumed run needs:
//!
//! - `progress.json` — the [`TrainProgress`] record (epoch and step counters)
//! - `model.json` — latest model parameters, plus a per-epoch copy
//! - `optimizer.json` — optimizer state (momentum/moment buffers)
//! - `log/` — summary events written by the logging sink
//!
//! The manager owns the progress record; model and optimizer state files
//! are written by the respective collaborators through the path accessors
//! here.

use crate::error::{Error, Result};
use crate::progress::TrainProgress;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Tracks and persists training progress for one run directory.
#[derive(Debug)]
pub struct Checkpoint {
    dir: PathBuf,
    progress: TrainProgress,
}

impl Checkpoint {
    /// Open a checkpoint directory, creating it (and its log dir) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::io(format!("creating checkpoint dir {}", dir.display()), e))?;
        let log_dir = dir.join("log");
        fs::create_dir_all(&log_dir)
            .map_err(|e| Error::io(format!("creating log dir {}", log_dir.display()), e))?;
        Ok(Self {
            dir,
            progress: TrainProgress::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory the summary writer appends events under.
    pub fn log_dir(&self) -> PathBuf {
        self.dir.join("log")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.dir.join("progress.json")
    }

    /// Latest model parameter state.
    pub fn model_path(&self) -> PathBuf {
        self.dir.join("model.json")
    }

    /// Per-epoch copy of the model parameter state.
    pub fn model_epoch_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch:03}.json"))
    }

    pub fn optimizer_path(&self) -> PathBuf {
        self.dir.join("optimizer.json")
    }

    /// Number of completed epochs; the first epoch a resumed run executes.
    pub fn last_epoch(&self) -> usize {
        self.progress.last_epoch
    }

    /// Current global step counter.
    pub fn global_step(&self) -> u64 {
        self.progress.global_step
    }

    pub fn progress(&self) -> &TrainProgress {
        &self.progress
    }

    /// Advance the global step counter and return the new value.
    pub fn step(&mut self) -> u64 {
        self.progress.step()
    }

    /// Restore the progress record from disk.
    ///
    /// Fails with [`Error::CheckpointNotFound`] when the directory has never
    /// been saved to.
    pub fn load(&mut self) -> Result<()> {
        let path = self.progress_path();
        if !path.exists() {
            return Err(Error::CheckpointNotFound { path });
        }
        self.progress = read_json(&path)?;
        Ok(())
    }

    /// Record `epochs` completed epochs and persist the progress record.
    pub fn save(&mut self, epochs: usize) -> Result<()> {
        self.progress.record_epochs_done(epochs);
        write_json(&self.progress_path(), &self.progress)
    }
}

/// Write a value as pretty JSON, with path context on failure.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data).map_err(|e| Error::io(format!("writing {}", path.display()), e))
}

/// Read a JSON value, with path context on failure.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
    Ok(serde_json::from_str(&raw)?)
}

//! Error types with actionable diagnostics.
//!
//! Collaborator failures (missing checkpoint, shape mismatch, I/O) are
//! surfaced with enough context to act on and always propagate to the
//! caller; nothing in this crate retries or silently recovers.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for incierto operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while training or evaluating.
#[derive(Error, Debug)]
pub enum Error {
    /// No checkpoint exists where one was expected.
    #[error("checkpoint not found: {path}\n  → run training first or point --ckpt-dir at an existing run")]
    CheckpointNotFound { path: PathBuf },

    /// A configuration value is invalid.
    #[error("invalid configuration value for '{field}': {message}")]
    Config { field: String, message: String },

    /// Configuration file has invalid syntax.
    #[error("invalid configuration syntax in {path}: {source}")]
    ConfigParsing {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Tensor dimensions do not line up.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Persisted collaborator state does not belong to this run setup.
    #[error("{collaborator} state in {path} does not match this run: {message}")]
    IncompatibleState {
        collaborator: &'static str,
        path: PathBuf,
        message: String,
    },

    /// The criterion needs a variance head the model does not provide.
    #[error("criterion '{criterion}' requires a model that emits a variance head")]
    MissingVariance { criterion: &'static str },

    /// Backward was requested with no cached forward activation.
    #[error("backward called before forward")]
    NoForwardPass,

    /// IO error with context.
    #[error("I/O error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_not_found_names_the_path() {
        let err = Error::CheckpointNotFound {
            path: "/tmp/run/progress.json".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/run/progress.json"));
        assert!(msg.contains("--ckpt-dir"));
    }

    #[test]
    fn test_io_error_constructor_keeps_context() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::io("reading progress record", io_err);
        let msg = err.to_string();
        assert!(msg.contains("reading progress record"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_shape_mismatch_lists_both_shapes() {
        let err = Error::ShapeMismatch {
            expected: vec![2, 3, 8, 8],
            actual: vec![2, 1, 8, 8],
        };
        let msg = err.to_string();
        assert!(msg.contains("[2, 3, 8, 8]"));
        assert!(msg.contains("[2, 1, 8, 8]"));
    }

    #[test]
    fn test_incompatible_state_names_collaborator() {
        let err = Error::IncompatibleState {
            collaborator: "optimizer",
            path: "opt.json".into(),
            message: "written by 'adam', this run uses 'sgd'".into(),
        };
        assert!(err.to_string().contains("optimizer"));
        assert!(err.to_string().contains("adam"));
    }
}

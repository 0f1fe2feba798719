//! Summary logging sinks.
//!
//! The training loop records scalars and image batches against a step
//! counter through the [`SummarySink`] contract. Backends: a JSONL file
//! writer for real runs and an in-memory recorder for inspection and
//! tests. The operator only holds a sink when logging is enabled, so
//! acquisition, every use, and the final close share one guard.

mod jsonl;
mod memory;

pub use jsonl::JsonlSummaryWriter;
pub use memory::InMemorySink;

use crate::error::Result;
use ndarray::Array4;

/// Logging sink contract.
pub trait SummarySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()>;

    fn add_images(&mut self, tag: &str, images: &Array4<f32>, step: u64) -> Result<()>;

    /// Flush and release the sink. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// A recorded summary event.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryEvent {
    Scalar {
        tag: String,
        value: f64,
        step: u64,
    },
    Images {
        tag: String,
        shape: Vec<usize>,
        step: u64,
    },
}

impl SummaryEvent {
    /// The event's tag, whatever its kind.
    pub fn tag(&self) -> &str {
        match self {
            Self::Scalar { tag, .. } | Self::Images { tag, .. } => tag,
        }
    }

    /// The step the event was keyed by.
    pub fn step(&self) -> u64 {
        match self {
            Self::Scalar { step, .. } | Self::Images { step, .. } => *step,
        }
    }
}

//! In-memory summary backend.

use super::{SummaryEvent, SummarySink};
use crate::error::Result;
use ndarray::Array4;
use std::sync::{Arc, Mutex, PoisonError};

/// Records events in memory.
///
/// Clones share the same event store, so a test can hand one clone to the
/// operator and keep another for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    events: Arc<Mutex<Vec<SummaryEvent>>>,
    closed: Arc<Mutex<bool>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in order.
    pub fn events(&self) -> Vec<SummaryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Steps of every scalar event with the given tag, in order.
    pub fn scalar_steps(&self, tag: &str) -> Vec<u64> {
        self.events()
            .iter()
            .filter(|e| matches!(e, SummaryEvent::Scalar { .. }) && e.tag() == tag)
            .map(SummaryEvent::step)
            .collect()
    }

    /// Values of every scalar event with the given tag, in order.
    pub fn scalar_values(&self, tag: &str) -> Vec<f64> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                SummaryEvent::Scalar { tag: t, value, .. } if t == tag => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Whether any images event with the given tag was recorded.
    pub fn has_images(&self, tag: &str) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, SummaryEvent::Images { .. }) && e.tag() == tag)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: SummaryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl SummarySink for InMemorySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        self.push(SummaryEvent::Scalar {
            tag: tag.to_string(),
            value,
            step,
        });
        Ok(())
    }

    fn add_images(&mut self, tag: &str, images: &Array4<f32>, step: u64) -> Result<()> {
        self.push(SummaryEvent::Images {
            tag: tag.to_string(),
            shape: images.shape().to_vec(),
            step,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_store() {
        let sink = InMemorySink::new();
        let mut handle = sink.clone();

        handle.add_scalar("loss", 0.5, 1).unwrap();
        handle
            .add_images("img", &Array4::zeros((1, 1, 2, 2)), 1)
            .unwrap();

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.scalar_steps("loss"), vec![1]);
        assert_eq!(sink.scalar_values("loss"), vec![0.5]);
        assert!(sink.has_images("img"));
        assert!(!sink.has_images("other"));
    }

    #[test]
    fn test_close_flag_is_shared() {
        let sink = InMemorySink::new();
        let mut handle = sink.clone();
        assert!(!sink.is_closed());
        handle.close().unwrap();
        assert!(sink.is_closed());
    }
}

//! Batches and batch sources.
//!
//! Images travel as NCHW `Array4<f32>` with pixel values in `[0, 1]`. The
//! training loop is agnostic to where batches come from; anything
//! implementing [`BatchLoader`] works. The built-in loader keeps batches in
//! memory and can be filled from a JSON batch file.

use crate::error::{Error, Result};
use ndarray::Array4;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One batch: input images and their labels, same NCHW shape.
///
/// The training objective is reconstruction, so the loss is computed
/// against `input`; `label` rides along for loaders and evaluation code
/// that want the clean reference.
#[derive(Debug, Clone)]
pub struct ImageBatch {
    pub input: Array4<f32>,
    pub label: Array4<f32>,
}

impl ImageBatch {
    /// Pair an input batch with its labels. The shapes must agree.
    pub fn new(input: Array4<f32>, label: Array4<f32>) -> Result<Self> {
        if input.shape() != label.shape() {
            return Err(Error::ShapeMismatch {
                expected: input.shape().to_vec(),
                actual: label.shape().to_vec(),
            });
        }
        Ok(Self { input, label })
    }

    /// Number of images in the batch.
    pub fn batch_size(&self) -> usize {
        self.input.shape()[0]
    }

    /// Number of channels per image.
    pub fn channels(&self) -> usize {
        self.input.shape()[1]
    }
}

/// A source of batches with a known length and loader-defined order.
pub trait BatchLoader {
    /// Number of batches one pass yields.
    fn len(&self) -> usize;

    /// Whether a pass would yield nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One pass over the batches.
    fn batches(&self) -> Box<dyn Iterator<Item = &ImageBatch> + '_>;
}

/// Batches held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    batches: Vec<ImageBatch>,
}

impl InMemoryLoader {
    pub fn new(batches: Vec<ImageBatch>) -> Self {
        Self { batches }
    }

    /// Read batches from a JSON batch file.
    ///
    /// Expected layout:
    ///
    /// ```json
    /// {"batches": [{"shape": [2, 1, 4, 4], "input": [...], "label": [...]}]}
    /// ```
    ///
    /// `input` and `label` are row-major flattened pixel data of the given
    /// NCHW shape.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading batch file {}", path.display()), e))?;
        let file: BatchFile = serde_json::from_str(&raw)?;

        let mut batches = Vec::with_capacity(file.batches.len());
        for record in file.batches {
            batches.push(record.into_batch()?);
        }
        Ok(Self::new(batches))
    }
}

impl BatchLoader for InMemoryLoader {
    fn len(&self) -> usize {
        self.batches.len()
    }

    fn batches(&self) -> Box<dyn Iterator<Item = &ImageBatch> + '_> {
        Box::new(self.batches.iter())
    }
}

/// The train/test split pair the operator drives.
pub struct DataLoaders {
    pub train: Box<dyn BatchLoader>,
    pub test: Box<dyn BatchLoader>,
}

impl DataLoaders {
    pub fn new(train: Box<dyn BatchLoader>, test: Box<dyn BatchLoader>) -> Self {
        Self { train, test }
    }
}

#[derive(Debug, Deserialize)]
struct BatchFile {
    batches: Vec<BatchRecord>,
}

#[derive(Debug, Deserialize)]
struct BatchRecord {
    shape: [usize; 4],
    input: Vec<f32>,
    label: Vec<f32>,
}

impl BatchRecord {
    fn into_batch(self) -> Result<ImageBatch> {
        let expected: usize = self.shape.iter().product();
        for data in [&self.input, &self.label] {
            if data.len() != expected {
                return Err(Error::ShapeMismatch {
                    expected: self.shape.to_vec(),
                    actual: vec![data.len()],
                });
            }
        }
        let [n, c, h, w] = self.shape;
        let input = Array4::from_shape_vec((n, c, h, w), self.input)
            .map_err(|_| shape_error(&self.shape))?;
        let label = Array4::from_shape_vec((n, c, h, w), self.label)
            .map_err(|_| shape_error(&self.shape))?;
        ImageBatch::new(input, label)
    }
}

fn shape_error(shape: &[usize; 4]) -> Error {
    Error::ShapeMismatch {
        expected: shape.to_vec(),
        actual: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn batch(value: f32) -> ImageBatch {
        ImageBatch::new(
            Array4::from_elem((2, 1, 4, 4), value),
            Array4::from_elem((2, 1, 4, 4), value),
        )
        .unwrap()
    }

    #[test]
    fn test_batch_rejects_mismatched_shapes() {
        let input = Array4::<f32>::zeros((2, 1, 4, 4));
        let label = Array4::<f32>::zeros((2, 3, 4, 4));
        assert!(matches!(
            ImageBatch::new(input, label),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_batch_dimensions() {
        let b = batch(0.5);
        assert_eq!(b.batch_size(), 2);
        assert_eq!(b.channels(), 1);
    }

    #[test]
    fn test_in_memory_loader_iterates_in_order() {
        let loader = InMemoryLoader::new(vec![batch(0.1), batch(0.2), batch(0.3)]);
        assert_eq!(loader.len(), 3);
        assert!(!loader.is_empty());

        let firsts: Vec<f32> = loader.batches().map(|b| b.input[[0, 0, 0, 0]]).collect();
        assert_eq!(firsts, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_from_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"batches": [{{"shape": [1, 1, 2, 2],
                "input": [0.1, 0.2, 0.3, 0.4],
                "label": [0.0, 0.0, 0.0, 0.0]}}]}}"#
        )
        .unwrap();

        let loader = InMemoryLoader::from_json(file.path()).unwrap();
        assert_eq!(loader.len(), 1);
        let b = loader.batches().next().unwrap();
        assert_eq!(b.input[[0, 0, 1, 1]], 0.4);
        assert_eq!(b.label[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_from_json_rejects_wrong_element_count() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"batches": [{{"shape": [1, 1, 2, 2],
                "input": [0.1, 0.2],
                "label": [0.0, 0.0, 0.0, 0.0]}}]}}"#
        )
        .unwrap();
        assert!(matches!(
            InMemoryLoader::from_json(file.path()),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}

//! JSONL summary backend.

use super::SummarySink;
use crate::error::{Error, Result};
use chrono::Utc;
use ndarray::Array4;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends one JSON event per line to `events.jsonl` under the log dir.
///
/// Image batches are recorded as shape plus channel statistics rather than
/// raw pixels; the events file is for inspecting a run, not reconstructing
/// it.
pub struct JsonlSummaryWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    closed: bool,
}

#[derive(Serialize)]
struct ScalarEvent<'a> {
    kind: &'static str,
    tag: &'a str,
    value: f64,
    step: u64,
    wall_time_ms: i64,
}

#[derive(Serialize)]
struct ImagesEvent<'a> {
    kind: &'static str,
    tag: &'a str,
    shape: Vec<usize>,
    min: f32,
    max: f32,
    mean: f32,
    step: u64,
    wall_time_ms: i64,
}

impl JsonlSummaryWriter {
    /// Open (appending) the events file under `log_dir`.
    pub fn create(log_dir: impl AsRef<Path>) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)
            .map_err(|e| Error::io(format!("creating log dir {}", log_dir.display()), e))?;
        let path = log_dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line<T: Serialize>(&mut self, event: &T) -> Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(self.writer, "{line}")
            .map_err(|e| Error::io(format!("appending to {}", self.path.display()), e))
    }
}

impl SummarySink for JsonlSummaryWriter {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        self.write_line(&ScalarEvent {
            kind: "scalar",
            tag,
            value,
            step,
            wall_time_ms: Utc::now().timestamp_millis(),
        })
    }

    fn add_images(&mut self, tag: &str, images: &Array4<f32>, step: u64) -> Result<()> {
        let (mut min, mut max, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f32);
        for &v in images.iter() {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let count = images.len();
        let (min, max, mean) = if count == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (min, max, sum / count as f32)
        };

        self.write_line(&ImagesEvent {
            kind: "images",
            tag,
            shape: images.shape().to_vec(),
            min,
            max,
            mean,
            step,
            wall_time_ms: Utc::now().timestamp_millis(),
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.writer
            .flush()
            .map_err(|e| Error::io(format!("flushing {}", self.path.display()), e))?;
        self.closed = true;
        Ok(())
    }
}

//! Quality metrics for image regression.

use ndarray::Array4;

/// Peak signal-to-noise ratio between a prediction and a reference, in dB.
///
/// Pixel values are assumed to lie in `[0, 1]`, so the peak is 1.0 and
/// `psnr = 10 * log10(1 / mse)`. An exact match yields `f32::INFINITY`.
///
/// # Example
///
/// ```
/// use incierto::metrics::calc_psnr;
/// use ndarray::Array4;
///
/// let pred = Array4::from_elem((1, 1, 2, 2), 0.6);
/// let target = Array4::from_elem((1, 1, 2, 2), 0.5);
/// let psnr = calc_psnr(&pred, &target);
/// assert!((psnr - 20.0).abs() < 1e-4);
/// ```
pub fn calc_psnr(pred: &Array4<f32>, target: &Array4<f32>) -> f32 {
    assert_eq!(
        pred.shape(),
        target.shape(),
        "prediction and reference must have the same shape"
    );
    assert!(!pred.is_empty(), "cannot score an empty batch");

    let mse = pred
        .iter()
        .zip(target.iter())
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f32>()
        / pred.len() as f32;

    if mse == 0.0 {
        f32::INFINITY
    } else {
        -10.0 * mse.log10()
    }
}

/// Elementwise logistic squashing, used to map a log-variance head into
/// `[0, 1]` for image summaries.
pub fn sigmoid(x: &Array4<f32>) -> Array4<f32> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// Running arithmetic mean over everything pushed so far.
///
/// The mean after N pushes equals the mean of the first N values exactly;
/// the evaluation loop reports it alongside each per-batch score.
#[derive(Debug, Clone, Default)]
pub struct RunningMean {
    values: Vec<f32>,
}

impl RunningMean {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value and return the mean of all values recorded so far.
    pub fn push(&mut self, value: f32) -> f32 {
        self.values.push(value);
        self.mean()
    }

    /// Mean of all recorded values, 0.0 when empty.
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f32>() / self.values.len() as f32
        }
    }

    /// Most recently recorded value.
    pub fn last(&self) -> Option<f32> {
        self.values.last().copied()
    }

    /// Number of recorded values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether anything has been recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

//! Mean squared error.

use super::{Criterion, LossOutput};
use crate::error::{Error, Result};
use crate::model::{Prediction, PredictionGrad};
use ndarray::Array4;

/// `L = mean((mean - target)^2)`, gradient `2 * (mean - target) / n`.
///
/// Ignores any variance head on the prediction.
pub struct MseLoss;

impl Criterion for MseLoss {
    fn forward(&self, prediction: &Prediction, target: &Array4<f32>) -> Result<LossOutput> {
        let mean = &prediction.mean;
        if mean.shape() != target.shape() {
            return Err(Error::ShapeMismatch {
                expected: target.shape().to_vec(),
                actual: mean.shape().to_vec(),
            });
        }

        let n = mean.len() as f32;
        let diff = mean - target;
        let value = diff.mapv(|d| d * d).sum() / n;
        let grad_mean = diff.mapv(|d| 2.0 * d / n);

        Ok(LossOutput {
            value,
            grad: PredictionGrad {
                mean: grad_mean,
                var: None,
            },
        })
    }

    fn name(&self) -> &'static str {
        "mse"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_value_and_gradient() {
        let mean = Array4::from_shape_vec((1, 1, 2, 2), vec![0.9, 1.7, 2.5, 3.3]).unwrap();
        let target = Array4::from_shape_vec((1, 1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let prediction = Prediction { mean, var: None };

        let out = MseLoss.forward(&prediction, &target).unwrap();
        // diffs: -0.1, -0.3, -0.5, -0.7 -> mse = 0.84 / 4
        assert_relative_eq!(out.value, 0.21, max_relative = 1e-5);
        // grad = 2 * diff / 4 = diff / 2
        assert_relative_eq!(out.grad.mean[[0, 0, 0, 0]], -0.05, max_relative = 1e-5);
        assert_relative_eq!(out.grad.mean[[0, 0, 1, 1]], -0.35, max_relative = 1e-5);
        assert!(out.grad.var.is_none());
    }

    #[test]
    fn test_zero_at_perfect_reconstruction() {
        let img = Array4::from_elem((2, 1, 3, 3), 0.4);
        let prediction = Prediction {
            mean: img.clone(),
            var: None,
        };
        let out = MseLoss.forward(&prediction, &img).unwrap();
        assert_eq!(out.value, 0.0);
        assert!(out.grad.mean.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_shape_mismatch() {
        let prediction = Prediction {
            mean: Array4::zeros((1, 1, 2, 2)),
            var: None,
        };
        let target = Array4::zeros((1, 1, 4, 4));
        assert!(matches!(
            MseLoss.forward(&prediction, &target),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_ignores_variance_head() {
        let img = Array4::from_elem((1, 1, 2, 2), 0.5);
        let with_var = Prediction {
            mean: img.clone(),
            var: Some(Array4::from_elem((1, 1, 2, 2), 3.0)),
        };
        let without = Prediction {
            mean: img.clone(),
            var: None,
        };
        let a = MseLoss.forward(&with_var, &img).unwrap();
        let b = MseLoss.forward(&without, &img).unwrap();
        assert_eq!(a.value, b.value);
    }
}

//! Gaussian negative log-likelihood over a log-variance head.

use super::{Criterion, LossOutput};
use crate::error::{Error, Result};
use crate::model::{Prediction, PredictionGrad};
use ndarray::Array4;

/// `L = mean(0.5 * (exp(-s) * (mean - target)^2 + s))` where `s` is the
/// predicted log-variance.
///
/// Gradients:
/// - w.r.t. mean: `exp(-s) * (mean - target) / n`
/// - w.r.t. s: `0.5 * (1 - exp(-s) * (mean - target)^2) / n`
///
/// Requires a prediction with a variance head.
pub struct GaussianNllLoss;

impl Criterion for GaussianNllLoss {
    fn forward(&self, prediction: &Prediction, target: &Array4<f32>) -> Result<LossOutput> {
        let s = prediction.var.as_ref().ok_or(Error::MissingVariance {
            criterion: "gaussian_nll",
        })?;
        let mean = &prediction.mean;
        for shape in [mean.shape(), s.shape()] {
            if shape != target.shape() {
                return Err(Error::ShapeMismatch {
                    expected: target.shape().to_vec(),
                    actual: shape.to_vec(),
                });
            }
        }

        let n = mean.len() as f32;
        let diff = mean - target;
        let sq = diff.mapv(|d| d * d);
        let inv_var = s.mapv(|v| (-v).exp());

        let value = (&inv_var * &sq + s).sum() * 0.5 / n;
        let grad_mean = (&inv_var * &diff).mapv(|g| g / n);
        let grad_var = (&inv_var * &sq).mapv(|v| 0.5 * (1.0 - v) / n);

        Ok(LossOutput {
            value,
            grad: PredictionGrad {
                mean: grad_mean,
                var: Some(grad_var),
            },
        })
    }

    fn name(&self) -> &'static str {
        "gaussian_nll"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn prediction(mean: f32, log_var: f32) -> Prediction {
        Prediction {
            mean: Array4::from_elem((1, 1, 2, 2), mean),
            var: Some(Array4::from_elem((1, 1, 2, 2), log_var)),
        }
    }

    #[test]
    fn test_reduces_to_half_mse_at_unit_variance() {
        let target = Array4::from_elem((1, 1, 2, 2), 0.5);
        let out = GaussianNllLoss
            .forward(&prediction(0.7, 0.0), &target)
            .unwrap();
        // s = 0: L = 0.5 * mean(diff^2) = 0.5 * 0.04
        assert_relative_eq!(out.value, 0.02, max_relative = 1e-5);
        // grad mean = diff / n = 0.2 / 4
        assert_relative_eq!(out.grad.mean[[0, 0, 0, 0]], 0.05, max_relative = 1e-5);
    }

    #[test]
    fn test_variance_gradient_balances_residual() {
        let target = Array4::from_elem((1, 1, 2, 2), 0.5);

        // Perfect mean: pushing s down is the only way to reduce the loss.
        let out = GaussianNllLoss
            .forward(&prediction(0.5, 0.0), &target)
            .unwrap();
        let gv = out.grad.var.unwrap();
        assert!(gv.iter().all(|&g| g > 0.0));

        // Large residual at low variance: s wants to grow.
        let out = GaussianNllLoss
            .forward(&prediction(2.5, 0.0), &target)
            .unwrap();
        let gv = out.grad.var.unwrap();
        assert!(gv.iter().all(|&g| g < 0.0));
    }

    #[test]
    fn test_missing_variance_head() {
        let target = Array4::zeros((1, 1, 2, 2));
        let pred = Prediction {
            mean: Array4::zeros((1, 1, 2, 2)),
            var: None,
        };
        assert!(matches!(
            GaussianNllLoss.forward(&pred, &target),
            Err(Error::MissingVariance { .. })
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let target = Array4::zeros((1, 1, 4, 4));
        assert!(matches!(
            GaussianNllLoss.forward(&prediction(0.0, 0.0), &target),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}

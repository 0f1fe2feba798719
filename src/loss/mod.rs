//! Loss criteria.
//!
//! A criterion maps (prediction, target) to a scalar loss plus analytic
//! gradients with respect to the model outputs. The training objective is
//! reconstruction, so the operator passes the *input* batch as the target.

mod gaussian_nll;
mod mse;

pub use gaussian_nll::GaussianNllLoss;
pub use mse::MseLoss;

use crate::config::Config;
use crate::error::Result;
use crate::model::{Prediction, PredictionGrad};
use crate::uncertainty::Uncertainty;
use ndarray::Array4;

/// Scalar loss value plus gradients w.r.t. the model outputs.
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub value: f32,
    pub grad: PredictionGrad,
}

/// Loss criterion contract.
pub trait Criterion {
    fn forward(&self, prediction: &Prediction, target: &Array4<f32>) -> Result<LossOutput>;

    fn name(&self) -> &'static str;
}

/// The criterion the uncertainty mode calls for.
///
/// Variance-head modes train the head with a Gaussian NLL; epistemic
/// variance comes from sampling at evaluation time, so its criterion is
/// plain MSE like normal regression.
pub fn from_config(config: &Config) -> Box<dyn Criterion> {
    match config.uncertainty {
        Uncertainty::Normal | Uncertainty::Epistemic => Box::new(MseLoss),
        Uncertainty::Aleatoric | Uncertainty::Combined => Box::new(GaussianNllLoss),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criterion_selection() {
        let mut config = Config::default();

        config.uncertainty = Uncertainty::Normal;
        assert_eq!(from_config(&config).name(), "mse");

        config.uncertainty = Uncertainty::Epistemic;
        assert_eq!(from_config(&config).name(), "mse");

        config.uncertainty = Uncertainty::Aleatoric;
        assert_eq!(from_config(&config).name(), "gaussian_nll");

        config.uncertainty = Uncertainty::Combined;
        assert_eq!(from_config(&config).name(), "gaussian_nll");
    }
}

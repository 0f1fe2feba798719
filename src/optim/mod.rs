//! Optimizers.
//!
//! Optimizers do not own parameters; the training loop borrows them from
//! the model at call time and hands them in as a slice. Internal state
//! (velocity and moment buffers) is positional, so the parameter order
//! must be stable across calls — models return their params in a fixed
//! order.

mod adam;
mod sgd;

pub use adam::Adam;
pub use sgd::Sgd;

use crate::checkpoint::Checkpoint;
use crate::config::{Config, OptimKind};
use crate::error::Result;
use crate::model::Param;

/// Optimizer collaborator contract.
pub trait Optimizer {
    /// Drop accumulated gradients on every parameter.
    fn zero_grad(&mut self, params: &mut [&mut Param]) {
        for param in params.iter_mut() {
            param.zero_grad();
        }
    }

    /// Apply one update from the accumulated gradients.
    fn step(&mut self, params: &mut [&mut Param]);

    /// Current learning rate.
    fn lr(&self) -> f32;

    fn set_lr(&mut self, lr: f32);

    /// Restore state from the checkpoint's optimizer file.
    fn load(&mut self, ckpt: &Checkpoint) -> Result<()>;

    /// Persist state to the checkpoint's optimizer file.
    fn save(&self, ckpt: &Checkpoint) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Construct the optimizer selected by the configuration.
pub fn from_config(config: &Config) -> Box<dyn Optimizer> {
    let spec = &config.optimizer;
    match spec.kind {
        OptimKind::Sgd => Box::new(Sgd::new(spec.lr, spec.momentum)),
        OptimKind::Adam => Box::new(Adam::new(spec.lr, spec.beta1, spec.beta2, spec.epsilon)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_honors_kind() {
        let mut config = Config::default();
        config.optimizer.kind = OptimKind::Sgd;
        assert_eq!(from_config(&config).name(), "sgd");

        config.optimizer.kind = OptimKind::Adam;
        config.optimizer.lr = 0.01;
        let adam = from_config(&config);
        assert_eq!(adam.name(), "adam");
        assert!((adam.lr() - 0.01).abs() < f32::EPSILON);
    }
}

//! The training/evaluation operator.
//!
//! Composes the four collaborators — model, criterion, optimizer, and
//! checkpoint manager — into the epoch/batch loop: forward, loss against
//! the input (reconstruction objective), backward, optimizer step,
//! per-epoch checkpoint save and test pass. Any collaborator failure
//! propagates and aborts the run.

use crate::checkpoint::Checkpoint;
use crate::config::{Config, Device};
use crate::data::{BatchLoader, DataLoaders, ImageBatch};
use crate::error::Result;
use crate::loss::{self, Criterion};
use crate::metrics::{calc_psnr, sigmoid, RunningMean};
use crate::model::{self, Mode, Model, Prediction};
use crate::optim::{self, Optimizer};
use crate::summary::{JsonlSummaryWriter, SummarySink};
use crate::uncertainty::Uncertainty;
use ndarray::Array4;

/// Drives training and evaluation for one run.
pub struct Operator {
    config: Config,
    device: Device,
    uncertainty: Uncertainty,
    ckpt: Checkpoint,
    /// Present iff logging is enabled; every use site shares this guard.
    writer: Option<Box<dyn SummarySink>>,
    model: Box<dyn Model>,
    criterion: Box<dyn Criterion>,
    optimizer: Box<dyn Optimizer>,
}

impl Operator {
    /// Build model, criterion and optimizer from the configuration.
    ///
    /// When resuming — or when constructed for evaluation only — the
    /// checkpoint, model weights, and optimizer state are restored
    /// immediately; a missing or incompatible checkpoint fails
    /// construction.
    pub fn new(config: Config, ckpt: Checkpoint, device: Device) -> Result<Self> {
        config.validate()?;

        let uncertainty = config.uncertainty;
        let writer: Option<Box<dyn SummarySink>> = if config.tensorboard {
            Some(Box::new(JsonlSummaryWriter::create(ckpt.log_dir())?))
        } else {
            None
        };

        let model = model::from_config(&config, device)?;
        let criterion = loss::from_config(&config);
        let optimizer = optim::from_config(&config);

        let mut operator = Self {
            config,
            device,
            uncertainty,
            ckpt,
            writer,
            model,
            criterion,
            optimizer,
        };

        if operator.config.is_resume || !operator.config.is_train {
            println!(
                "Loading checkpoint from {}",
                operator.ckpt.dir().display()
            );
            operator.load()?;
            println!(
                "Resuming at epoch {}, global step {}",
                operator.ckpt.last_epoch(),
                operator.ckpt.global_step()
            );
        }

        Ok(operator)
    }

    /// Replace the summary sink (alternate backends, tests).
    pub fn set_summary_sink(&mut self, sink: Box<dyn SummarySink>) {
        self.writer = Some(sink);
    }

    /// Train from the last completed epoch up to `config.epochs`.
    pub fn train(&mut self, loaders: &DataLoaders) -> Result<()> {
        let last_epoch = self.ckpt.last_epoch();
        let train_batch_num = loaders.train.len();
        self.model.set_mode(Mode::Train);

        for epoch in last_epoch..self.config.epochs {
            for (batch_idx, batch) in loaders.train.batches().enumerate() {
                // forward; the loss compares the output to the input
                let results = self.model.forward(&batch.input)?;
                let loss = self.criterion.forward(&results, &batch.input)?;

                // backward
                self.optimizer.zero_grad(&mut self.model.params_mut());
                self.model.backward(&loss.grad)?;
                self.optimizer.step(&mut self.model.params_mut());

                println!(
                    "Epoch: {:03}/{:03}, Iter: {:03}/{:03}, Loss: {:.5}",
                    epoch, self.config.epochs, batch_idx, train_batch_num, loss.value
                );

                if let Some(writer) = self.writer.as_mut() {
                    let step = self.ckpt.step();
                    writer.add_scalar("train/loss", f64::from(loss.value), step)?;
                    writer.add_images("train/input_img", &batch.input, step)?;
                    writer.add_images("train/mean_img", &results.mean, step)?;
                }
            }

            // save model; the argument counts completed epochs
            self.save(epoch + 1)?;
            self.model.set_mode(Mode::Train);

            if let Some(writer) = self.writer.as_mut() {
                let lr = self.optimizer.lr();
                println!("Epoch {:03}: lr={lr:.6}", epoch);
                writer.add_scalar("epoch_lr", f64::from(lr), epoch as u64)?;
            }

            self.test(loaders)?;
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.close()?;
        }
        Ok(())
    }

    /// Evaluate on the test split, returning the average PSNR.
    ///
    /// Forward-only: no gradients are computed or applied. The model is
    /// switched to eval mode only when the uncertainty mode asks for it;
    /// other variants keep whatever mode they were in.
    pub fn test(&mut self, loaders: &DataLoaders) -> Result<f32> {
        if self.uncertainty.eval_during_test() {
            self.model.set_mode(Mode::Eval);
        }

        let mut psnr = RunningMean::new();
        let test_batch_num = loaders.test.len();
        let mut last: Option<(&ImageBatch, Prediction)> = None;

        for (batch_idx, batch) in loaders.test.batches().enumerate() {
            let results = self.model.forward(&batch.input)?;
            let current = calc_psnr(&results.mean, &batch.input);
            let total = psnr.push(current);
            println!(
                "Test iter: {:03}/{:03}, Total: {:.5}, Current: {:.5}",
                batch_idx, test_batch_num, total, current
            );
            last = Some((batch, results));
        }

        if let Some(writer) = self.writer.as_mut() {
            // keyed by the last completed epoch, like every per-epoch record
            if let Some((batch, results)) = &last {
                let epoch = self.ckpt.last_epoch() as u64;
                writer.add_scalar("test/psnr", f64::from(psnr.mean()), epoch)?;
                writer.add_images("test/input_img", &batch.input, epoch)?;
                writer.add_images("test/mean_img", &results.mean, epoch)?;
                if self.uncertainty.supports_variance() {
                    if let Some(var) = &results.var {
                        writer.add_images("test/var_img", &sigmoid(var), epoch)?;
                    }
                }
            }
        }

        Ok(psnr.mean())
    }

    /// Restore run state: checkpoint, then model, then optimizer.
    ///
    /// The order is fixed — model and optimizer restoration read files the
    /// checkpoint manager resolves.
    pub fn load(&mut self) -> Result<()> {
        self.ckpt.load()?;
        self.model.load(&self.ckpt)?;
        self.optimizer.load(&self.ckpt)?;
        Ok(())
    }

    /// Persist run state in the same order: checkpoint bookkeeping, model
    /// weights, optimizer state. `epochs_done` counts completed epochs.
    pub fn save(&mut self, epochs_done: usize) -> Result<()> {
        self.ckpt.save(epochs_done)?;
        self.model.save(&self.ckpt, epochs_done)?;
        self.optimizer.save(&self.ckpt)?;
        Ok(())
    }

    /// Forward pass on an arbitrary input, without touching gradients.
    pub fn predict(&mut self, input: &Array4<f32>) -> Result<Prediction> {
        self.model.forward(input)
    }

    /// Current learning rate.
    pub fn lr(&self) -> f32 {
        self.optimizer.lr()
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.ckpt
    }

    pub fn uncertainty(&self) -> Uncertainty {
        self.uncertainty
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// The model's current train/eval mode.
    pub fn model_mode(&self) -> Mode {
        self.model.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::tempdir;

    #[test]
    fn test_resume_without_checkpoint_fails_construction() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpoint::new(dir.path()).unwrap();
        let config = Config {
            is_resume: true,
            ..Config::default()
        };
        assert!(matches!(
            Operator::new(config, ckpt, Device::Cpu),
            Err(Error::CheckpointNotFound { .. })
        ));
    }

    #[test]
    fn test_eval_only_construction_also_loads() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpoint::new(dir.path()).unwrap();
        let config = Config {
            is_train: false,
            ..Config::default()
        };
        assert!(Operator::new(config, ckpt, Device::Cpu).is_err());
    }

    #[test]
    fn test_construction_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpoint::new(dir.path()).unwrap();
        let mut config = Config::default();
        config.optimizer.lr = -1.0;
        assert!(matches!(
            Operator::new(config, ckpt, Device::Cpu),
            Err(Error::Config { .. })
        ));
    }
}

//! # Flag-Driven Batch Norm
//!
//! ``burn::nn::BatchNorm`` picks batch or running statistics from
//! ``B::ad_enabled()``. [`FlagBatchNorm`] takes that decision from the
//! caller's `training` flag, as [`crate::layers::drop::dropout::FlagDropout`]
//! does for dropout:
//!
//! * `training`: normalize with the batch statistics, and fold them into
//!   the running statistics.
//! * otherwise: normalize with the running statistics only; the layer is
//!   a fixed per-channel affine map and leaves its state untouched.

use bimm_contracts::unpack_shape_contract;
use burn::config::Config;
use burn::module::Module;
use burn::nn::{BatchNorm, BatchNormConfig};
use burn::prelude::{Backend, Tensor};

/// [`FlagBatchNorm`] Config.
///
/// Defaults are the TensorFlow layer defaults.
/// ``momentum=0.999`` in the TensorFlow convention is ``0.001`` here,
/// where the momentum weights the *new* batch statistics.
#[derive(Config, Debug)]
pub struct FlagBatchNormConfig {
    /// Number of channels.
    pub num_features: usize,

    /// Variance epsilon.
    #[config(default = 1e-3)]
    pub epsilon: f64,

    /// Weight of the batch statistics in the running update.
    #[config(default = 0.001)]
    pub momentum: f64,
}

impl FlagBatchNormConfig {
    /// Initialize a [`FlagBatchNorm`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> FlagBatchNorm<B> {
        assert!(self.num_features > 0, "num_features must be > 0");
        FlagBatchNorm {
            norm: BatchNormConfig::new(self.num_features)
                .with_epsilon(self.epsilon)
                .with_momentum(self.momentum)
                .init(device),
        }
    }
}

/// A [`FlagBatchNormConfig`] with TensorFlow layer defaults.
pub fn tf_batch_norm(num_features: usize) -> FlagBatchNormConfig {
    FlagBatchNormConfig::new(num_features)
}

/// 2d batch norm with an explicit train/eval flag.
#[derive(Module, Debug)]
pub struct FlagBatchNorm<B: Backend> {
    /// Parameters and running statistics.
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> FlagBatchNorm<B> {
    /// Number of channels.
    pub fn num_features(&self) -> usize {
        self.norm.gamma.shape().dims[0]
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    /// - `training`: use (and record) batch statistics.
    ///
    /// # Returns
    ///
    /// ``[batch, channels, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        training: bool,
    ) -> Tensor<B, 4> {
        let [batch, channels, height, width] = unpack_shape_contract!(
            ["batch", "channels", "height", "width"],
            &input,
            &["batch", "channels", "height", "width"],
            &[("channels", self.num_features())]
        );
        let device = input.device();

        let (mean, var) = if training {
            let flat = input
                .clone()
                .swap_dims(0, 1)
                .reshape([channels, batch * height * width]);
            let mean = flat.clone().mean_dim(1).reshape([channels]);
            let var = flat
                .sub(mean.clone().reshape([channels, 1]))
                .powi_scalar(2)
                .mean_dim(1)
                .reshape([channels]);

            let momentum = self.norm.momentum;
            let running_mean = self
                .norm
                .running_mean
                .value_sync()
                .to_device(&device)
                .mul_scalar(1.0 - momentum)
                .add(mean.clone().detach().mul_scalar(momentum));
            let running_var = self
                .norm
                .running_var
                .value_sync()
                .to_device(&device)
                .mul_scalar(1.0 - momentum)
                .add(var.clone().detach().mul_scalar(momentum));
            self.norm.running_mean.update(running_mean.detach());
            self.norm.running_var.update(running_var.detach());

            (mean, var)
        } else {
            (
                self.norm.running_mean.value().to_device(&device),
                self.norm.running_var.value().to_device(&device),
            )
        };

        let shape = [1, channels, 1, 1];
        let std = var.add_scalar(self.norm.epsilon).sqrt().reshape(shape);
        let x = input.sub(mean.reshape(shape)).div(std);
        let x = x.mul(self.norm.gamma.val().reshape(shape));
        x.add(self.norm.beta.val().reshape(shape))
    }
}

//! # Shake-Shake Residual Block
//!
//! [`ShakeBlock`] has two independently parameterized branches with the
//! same structure:
//!
//! ```text
//! relu -> conv3x3(stride) -> bn -> relu -> conv3x3 -> bn
//! ```
//!
//! merged by [`shake_shake`] and added to a [`ShakeShortcut`]:
//! * stride 2: [`FactorizedReduce`], two half-width 1x1 convs over the
//!   even and odd offset subsamples, concatenated and normalized;
//! * stride 1, channel change: 1x1 conv -> bn;
//! * otherwise: the identity.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::layers::blocks::conv_act_norm::{
    ConvActNorm2d, ConvActNorm2dConfig, ConvActNorm2dMeta,
};
use crate::layers::norm::batch_norm::{FlagBatchNorm, tf_batch_norm};
use crate::layers::padding::PaddingPolicy;
use crate::layers::shake::shake_shake;
use crate::models::util::he_normal;
use bimm_contracts::{assert_shape_contract, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

fn shake_conv(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
) -> ConvActNorm2dConfig {
    ConvActNorm2dConfig::new(in_channels, out_channels, kernel_size)
        .with_stride(stride)
        .with_bias(false)
        .with_initializer(he_normal(kernel_size, out_channels))
}

/// [`ShakeBranch`] Config.
#[derive(Config, Debug)]
pub struct ShakeBranchConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The size of the out channels dimension.
    pub out_channels: usize,

    /// The stride of the first conv.
    #[config(default = 1)]
    pub stride: usize,
}

impl ShakeBranchConfig {
    /// Initialize a [`ShakeBranch`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ShakeBranch<B> {
        ShakeBranch {
            act: ActivationConfig::Relu.init(),
            conv1: shake_conv(self.in_channels, self.out_channels, 3, self.stride)
                .with_tf_norm()
                .init(device),
            conv2: shake_conv(self.out_channels, self.out_channels, 3, 1)
                .with_tf_norm()
                .init(device),
        }
    }
}

/// One residual branch of a [`ShakeBlock`].
#[derive(Module, Debug)]
pub struct ShakeBranch<B: Backend> {
    act: Activation,
    conv1: ConvActNorm2d<B>,
    conv2: ConvActNorm2d<B>,
}

impl<B: Backend> ShakeBranch<B> {
    /// Forward Pass.
    ///
    /// `training` selects the batch-norm mode.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        training: bool,
    ) -> Tensor<B, 4> {
        let x = self.act.forward(input);
        let x = self.conv1.forward(x, training);
        let x = self.act.forward(x);
        self.conv2.forward(x, training)
    }
}

/// [`FactorizedReduce`] Config.
#[derive(Config, Debug)]
pub struct FactorizedReduceConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The size of the out channels dimension; must be even.
    pub out_channels: usize,
}

impl FactorizedReduceConfig {
    /// Initialize a [`FactorizedReduce`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> FactorizedReduce<B> {
        assert!(
            self.out_channels % 2 == 0,
            "factorized reduce needs even out_channels, got {}",
            self.out_channels
        );
        let half = self.out_channels / 2;
        let conv = shake_conv(self.in_channels, half, 1, 2).with_padding(PaddingPolicy::Valid);

        FactorizedReduce {
            act: ActivationConfig::Relu.init(),
            even: conv.init(device),
            odd: conv.init(device),
            norm: tf_batch_norm(self.out_channels).init(device),
        }
    }
}

/// Stride-2 shortcut built from two offset 1x1 projections.
#[derive(Module, Debug)]
pub struct FactorizedReduce<B: Backend> {
    act: Activation,
    even: ConvActNorm2d<B>,
    odd: ConvActNorm2d<B>,
    norm: FlagBatchNorm<B>,
}

impl<B: Backend> FactorizedReduce<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, out_height * 2, out_width * 2]``.
    /// - `training`: norm mode.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        training: bool,
    ) -> Tensor<B, 4> {
        assert_shape_contract!(
            [
                "batch",
                "in_channels",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &[("in_channels", self.even.in_channels()), ("stride", 2)]
        );
        let [batch, channels, height, width] = input.dims();

        let x = self.act.forward(input);
        let shifted = x
            .clone()
            .slice([0..batch, 0..channels, 1..height, 1..width]);

        let x = Tensor::cat(
            vec![
                self.even.forward(x, training),
                self.odd.forward(shifted, training),
            ],
            1,
        );
        self.norm.forward(x, training)
    }
}

/// The shortcut path of a [`ShakeBlock`].
#[derive(Module, Debug)]
pub enum ShakeShortcut<B: Backend> {
    /// Stride-2 factorized projection.
    Factorized(FactorizedReduce<B>),

    /// Stride-1 ``conv1x1 -> bn`` projection.
    Projection(ConvActNorm2d<B>),
}

/// [`ShakeBlock`] Config.
#[derive(Config, Debug)]
pub struct ShakeBlockConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The size of the out channels dimension.
    pub out_channels: usize,

    /// The stride of the block; 1 or 2.
    #[config(default = 1)]
    pub stride: usize,
}

impl ShakeBlockConfig {
    /// Initialize a [`ShakeBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ShakeBlock<B> {
        assert!(
            self.stride == 1 || self.stride == 2,
            "shake block stride must be 1 or 2, got {}",
            self.stride
        );
        let branch = ShakeBranchConfig::new(self.in_channels, self.out_channels)
            .with_stride(self.stride);

        let shortcut = if self.stride == 2 {
            Some(ShakeShortcut::Factorized(
                FactorizedReduceConfig::new(self.in_channels, self.out_channels).init(device),
            ))
        } else if self.in_channels != self.out_channels {
            Some(ShakeShortcut::Projection(
                shake_conv(self.in_channels, self.out_channels, 1, 1)
                    .with_tf_norm()
                    .init(device),
            ))
        } else {
            None
        };

        ShakeBlock {
            branch_a: branch.init(device),
            branch_b: branch.init(device),
            shortcut,
            in_channels: self.in_channels,
            out_channels: self.out_channels,
            stride: self.stride,
        }
    }
}

/// Shake-Shake residual block.
#[derive(Module, Debug)]
pub struct ShakeBlock<B: Backend> {
    /// First residual branch.
    pub branch_a: ShakeBranch<B>,

    /// Second residual branch.
    pub branch_b: ShakeBranch<B>,

    /// Optional shortcut projection.
    pub shortcut: Option<ShakeShortcut<B>>,

    in_channels: usize,
    out_channels: usize,
    stride: usize,
}

impl<B: Backend> ShakeBlock<B> {
    /// The size of the in channels dimension.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// The size of the out channels dimension.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// The block stride.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    /// - `training`: enables stochastic branch mixing; selects batch-norm mode.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, in_height / stride, in_width / stride]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        training: bool,
    ) -> Tensor<B, 4> {
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_channels",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[("in_channels", self.in_channels), ("stride", self.stride)]
        );

        let x = shake_shake(
            self.branch_a.forward(input.clone(), training),
            self.branch_b.forward(input.clone(), training),
            training,
        );

        let shortcut = match &self.shortcut {
            Some(ShakeShortcut::Factorized(reduce)) => reduce.forward(input, training),
            Some(ShakeShortcut::Projection(conv)) => conv.forward(input, training),
            None => input,
        };
        let out = shortcut + x;

        assert_shape_contract!(
            ["batch", "out_channels", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestAutodiffBackend, TestBackend, tensor_values};
    use burn::tensor::Distribution;

    #[test]
    fn test_shortcut_selection() {
        let device = Default::default();

        let block: ShakeBlock<TestBackend> = ShakeBlockConfig::new(8, 8).init(&device);
        assert!(block.shortcut.is_none());

        let block: ShakeBlock<TestBackend> = ShakeBlockConfig::new(16, 8).init(&device);
        match &block.shortcut {
            Some(ShakeShortcut::Projection(conv)) => {
                assert_eq!(conv.kernel_size(), 1);
                assert_eq!(conv.out_channels(), 8);
                assert!(conv.norm.is_some());
            }
            other => panic!("unexpected shortcut: {other:?}"),
        }

        let block: ShakeBlock<TestBackend> =
            ShakeBlockConfig::new(8, 16).with_stride(2).init(&device);
        assert!(matches!(block.shortcut, Some(ShakeShortcut::Factorized(_))));
    }

    #[test]
    fn test_factorized_reduce_shape() {
        let device = Default::default();
        let reduce: FactorizedReduce<TestBackend> =
            FactorizedReduceConfig::new(4, 8).init(&device);
        let input = Tensor::random([2, 4, 8, 8], Distribution::Default, &device);
        assert_eq!(reduce.forward(input, false).dims(), [2, 8, 4, 4]);
    }

    #[test]
    fn test_branches_do_not_share_parameters() {
        let device = Default::default();
        let block: ShakeBlock<TestBackend> = ShakeBlockConfig::new(4, 4).init(&device);
        let a = block.branch_a.conv1.conv.weight.val();
        let b = block.branch_b.conv1.conv.weight.val();
        assert_ne!(tensor_values(a), tensor_values(b));
    }

    #[test]
    fn test_eval_is_deterministic() {
        let device = Default::default();
        let block: ShakeBlock<TestBackend> =
            ShakeBlockConfig::new(4, 8).with_stride(2).init(&device);
        let input = Tensor::random([2, 4, 8, 8], Distribution::Default, &device);

        let first = block.forward(input.clone(), false);
        let second = block.forward(input, false);
        assert_eq!(first.dims(), [2, 8, 4, 4]);
        first.to_data().assert_eq(&second.to_data(), true);
    }

    #[test]
    fn test_eval_leaves_running_statistics() {
        let device = Default::default();
        let block: ShakeBlock<TestAutodiffBackend> =
            ShakeBlockConfig::new(4, 8).with_stride(2).init(&device);
        let input = Tensor::random([2, 4, 8, 8], Distribution::Normal(3.0, 1.0), &device);
        let running_mean = |block: &ShakeBlock<TestAutodiffBackend>| match &block.shortcut {
            Some(ShakeShortcut::Factorized(reduce)) => {
                tensor_values(reduce.norm.norm.running_mean.value())
            }
            other => panic!("unexpected shortcut: {other:?}"),
        };

        let _ = block.forward(input.clone(), false);
        assert_eq!(running_mean(&block), vec![0.0; 8]);

        let _ = block.forward(input, true);
        assert!(running_mean(&block).iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_training_shape() {
        let device = Default::default();
        let block: ShakeBlock<TestBackend> = ShakeBlockConfig::new(4, 4).init(&device);
        let input = Tensor::random([3, 4, 6, 6], Distribution::Default, &device);
        assert_eq!(block.forward(input, true).dims(), [3, 4, 6, 6]);
    }
}

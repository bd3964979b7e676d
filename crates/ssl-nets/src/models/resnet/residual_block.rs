//! # Pre-Activation Residual Block
//!
//! [`PreActBlock`] is the wide-ResNet unit:
//!
//! ```text
//! x = leaky_relu(bn(x0))
//! if activate_before_residual: x0 = x
//! y = conv3x3(x, stride)
//! y = conv3x3(leaky_relu(bn(y)))
//! return shortcut(x0) + y
//! ```
//!
//! The shortcut is a strided 1x1 projection when the block changes the
//! channel count or downsamples, and the identity otherwise.
//!
//! [`PreActBlockMeta`] defines a common meta API for [`PreActBlock`]
//! and [`PreActBlockConfig`].

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::layers::blocks::conv_act_norm::{
    ConvActNorm2d, ConvActNorm2dConfig, ConvActNorm2dMeta,
};
use crate::layers::norm::batch_norm::{FlagBatchNorm, tf_batch_norm};
use crate::layers::padding::PaddingPolicy;
use crate::models::util::{he_normal, needs_projection};
use bimm_contracts::{assert_shape_contract, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// [`PreActBlock`] Meta trait.
pub trait PreActBlockMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_channels(&self) -> usize;

    /// The stride of the first conv, and of the projection.
    fn stride(&self) -> usize;

    /// Whether the shortcut reads the activated input.
    fn activate_before_residual(&self) -> bool;

    /// Whether the shortcut is a projection.
    fn has_projection(&self) -> bool {
        needs_projection(self.in_channels(), self.out_channels(), self.stride())
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// ``out = ceil(in / stride)``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> Option<[usize; 2]> {
        PaddingPolicy::Same.output_resolution(input_resolution, 3, self.stride())
    }
}

/// [`PreActBlock`] Config.
#[derive(Config, Debug)]
pub struct PreActBlockConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The size of the out channels dimension.
    pub out_channels: usize,

    /// The stride of the first conv.
    #[config(default = 1)]
    pub stride: usize,

    /// Whether the shortcut reads the activated input.
    #[config(default = "false")]
    pub activate_before_residual: bool,

    /// Leaky-relu negative slope.
    #[config(default = "0.1")]
    pub negative_slope: f64,
}

impl PreActBlockMeta for PreActBlockConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn activate_before_residual(&self) -> bool {
        self.activate_before_residual
    }
}

impl PreActBlockConfig {
    /// Initialize a [`PreActBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> PreActBlock<B> {
        assert!(self.stride > 0, "stride must be > 0");
        let out = self.out_channels;

        let conv1 = ConvActNorm2dConfig::new(self.in_channels, out, 3)
            .with_stride(self.stride)
            .with_initializer(he_normal(3, out));
        let conv2 = ConvActNorm2dConfig::new(out, out, 3).with_initializer(he_normal(3, out));

        let projection = if self.has_projection() {
            Some(
                ConvActNorm2dConfig::new(self.in_channels, out, 1)
                    .with_stride(self.stride)
                    .with_initializer(he_normal(1, out))
                    .init(device),
            )
        } else {
            None
        };

        PreActBlock {
            norm1: tf_batch_norm(self.in_channels).init(device),
            conv1: conv1.init(device),
            norm2: tf_batch_norm(out).init(device),
            conv2: conv2.init(device),
            act: ActivationConfig::leaky_relu(self.negative_slope).init(),
            projection,
            activate_before_residual: self.activate_before_residual,
        }
    }
}

/// Pre-activation residual block.
///
/// Implements [`PreActBlockMeta`].
#[derive(Module, Debug)]
pub struct PreActBlock<B: Backend> {
    /// Norm applied to the block input.
    pub norm1: FlagBatchNorm<B>,

    /// Strided 3x3 conv.
    pub conv1: ConvActNorm2d<B>,

    /// Norm between the convs.
    pub norm2: FlagBatchNorm<B>,

    /// Second 3x3 conv.
    pub conv2: ConvActNorm2d<B>,

    /// Shared activation.
    pub act: Activation,

    /// Optional 1x1 shortcut projection.
    pub projection: Option<ConvActNorm2d<B>>,

    /// Whether the shortcut reads the activated input.
    pub activate_before_residual: bool,
}

impl<B: Backend> PreActBlockMeta for PreActBlock<B> {
    fn in_channels(&self) -> usize {
        self.conv1.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.conv2.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv1.stride()
    }

    fn activate_before_residual(&self) -> bool {
        self.activate_before_residual
    }

    fn has_projection(&self) -> bool {
        self.projection.is_some()
    }
}

impl<B: Backend> PreActBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
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
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.act.forward(self.norm1.forward(input.clone(), training));
        let shortcut = if self.activate_before_residual {
            x.clone()
        } else {
            input
        };

        let y = self.conv1.forward(x, training);
        let y = self.act.forward(self.norm2.forward(y, training));
        let y = self.conv2.forward(y, training);

        let shortcut = match &self.projection {
            Some(projection) => projection.forward(shortcut, training),
            None => shortcut,
        };
        let out = shortcut + y;

        if let Some([out_height, out_width]) = self.output_resolution([in_height, in_width]) {
            assert_shape_contract!(
                ["batch", "out_channels", "out_height", "out_width"],
                &out,
                &[
                    ("batch", batch),
                    ("out_channels", self.out_channels()),
                    ("out_height", out_height),
                    ("out_width", out_width)
                ]
            );
        }

        out
    }
}

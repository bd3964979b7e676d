//! # Fire Module
//!
//! The `SqueezeNet` unit:
//!
//! ```text
//! s = relu(conv1x1(x, squeeze))
//! concat([relu(conv1x1(s, expand1x1)), relu(conv3x3(s, expand3x3))], channels)
//! ```
//!
//! [`FireMeta`] defines a common meta API for [`Fire`] and [`FireConfig`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::layers::blocks::conv_act_norm::{ConvActNorm2d, ConvActNorm2dConfig, ConvActNorm2dMeta};
use bimm_contracts::{assert_shape_contract, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// [`Fire`] Meta trait.
pub trait FireMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// Width of the squeeze conv.
    fn squeeze_channels(&self) -> usize;

    /// Width of the 1x1 expand conv.
    fn expand1x1_channels(&self) -> usize;

    /// Width of the 3x3 expand conv.
    fn expand3x3_channels(&self) -> usize;

    /// The size of the out channels dimension.
    ///
    /// ``expand1x1 + expand3x3``
    fn out_channels(&self) -> usize {
        self.expand1x1_channels() + self.expand3x3_channels()
    }
}

/// [`Fire`] Config.
#[derive(Config, Debug)]
pub struct FireConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// Width of the squeeze conv.
    pub squeeze: usize,

    /// Width of the 1x1 expand conv.
    pub expand1x1: usize,

    /// Width of the 3x3 expand conv.
    pub expand3x3: usize,
}

impl FireMeta for FireConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn squeeze_channels(&self) -> usize {
        self.squeeze
    }

    fn expand1x1_channels(&self) -> usize {
        self.expand1x1
    }

    fn expand3x3_channels(&self) -> usize {
        self.expand3x3
    }
}

impl FireConfig {
    /// Initialize a [`Fire`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Fire<B> {
        assert!(
            self.squeeze > 0 && self.expand1x1 > 0 && self.expand3x3 > 0,
            "fire widths must be > 0: {:?}",
            self
        );
        let relu = Some(ActivationConfig::Relu);

        Fire {
            squeeze: ConvActNorm2dConfig::new(self.in_channels, self.squeeze, 1)
                .with_act(relu.clone())
                .init(device),
            expand1x1: ConvActNorm2dConfig::new(self.squeeze, self.expand1x1, 1)
                .with_act(relu.clone())
                .init(device),
            expand3x3: ConvActNorm2dConfig::new(self.squeeze, self.expand3x3, 3)
                .with_act(relu)
                .init(device),
        }
    }
}

/// Squeeze / parallel-expand block.
///
/// Implements [`FireMeta`].
#[derive(Module, Debug)]
pub struct Fire<B: Backend> {
    /// Squeeze 1x1 conv.
    pub squeeze: ConvActNorm2d<B>,

    /// Expand 1x1 conv.
    pub expand1x1: ConvActNorm2d<B>,

    /// Expand 3x3 conv.
    pub expand3x3: ConvActNorm2d<B>,
}

impl<B: Backend> FireMeta for Fire<B> {
    fn in_channels(&self) -> usize {
        self.squeeze.in_channels()
    }

    fn squeeze_channels(&self) -> usize {
        self.squeeze.out_channels()
    }

    fn expand1x1_channels(&self) -> usize {
        self.expand1x1.out_channels()
    }

    fn expand3x3_channels(&self) -> usize {
        self.expand3x3.out_channels()
    }
}

impl<B: Backend> Fire<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    /// - `training`: passed to the conv blocks.
    ///
    /// # Returns
    ///
    /// ``[batch, expand1x1 + expand3x3, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        training: bool,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.squeeze.forward(input, training);
        let x = Tensor::cat(
            vec![
                self.expand1x1.forward(x.clone(), training),
                self.expand3x3.forward(x, training),
            ],
            1,
        );

        assert_shape_contract!(
            ["batch", "out_channels", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("height", height),
                ("width", width)
            ]
        );
        x
    }
}

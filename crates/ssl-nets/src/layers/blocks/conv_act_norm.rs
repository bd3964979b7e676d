//! # `ConvActNorm2d` - conv/activation/norm block.
//!
//! A [`ConvActNorm2d`] module is:
//! * a [`PaddingPolicy`] applied to the input,
//! * a [`Conv2d`] layer (with no internal padding),
//! * an optional [`Activation`] layer,
//! * an optional [`FlagBatchNorm`] layer.
//!
//! The activation runs *before* the norm; this is the ordering the
//! `CNN13` backbone is defined with. With no activation the block is
//! a plain ``conv -> norm``, and with neither it is a padded conv.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::layers::norm::batch_norm::{FlagBatchNorm, FlagBatchNormConfig, tf_batch_norm};
use crate::layers::padding::PaddingPolicy;
use bimm_contracts::{assert_shape_contract, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};

/// [`ConvActNorm2d`] Meta.
pub trait ConvActNorm2dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Square kernel size.
    fn kernel_size(&self) -> usize;

    /// Stride along both axes.
    fn stride(&self) -> usize;

    /// Padding policy.
    fn padding(&self) -> PaddingPolicy;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Returns
    ///
    /// `None` if the kernel does not fit the input.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> Option<[usize; 2]> {
        self.padding()
            .output_resolution(input_resolution, self.kernel_size(), self.stride())
    }
}

/// [`ConvActNorm2d`] Config.
///
/// Implements [`ConvActNorm2dMeta`].
#[derive(Config, Debug)]
pub struct ConvActNorm2dConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Square kernel size.
    pub kernel_size: usize,

    /// Stride along both axes.
    #[config(default = 1)]
    pub stride: usize,

    /// Padding policy.
    #[config(default = "PaddingPolicy::Same")]
    pub padding: PaddingPolicy,

    /// Whether the conv has a bias.
    #[config(default = "true")]
    pub bias: bool,

    /// The conv weight initializer.
    #[config(default = "Initializer::XavierUniform { gain: 1.0 }")]
    pub initializer: Initializer,

    /// Optional activation, applied after the conv.
    #[config(default = "None")]
    pub act: Option<ActivationConfig>,

    /// Optional norm, applied last.
    ///
    /// The feature size is auto-matched to `out_channels`.
    #[config(default = "None")]
    pub norm: Option<FlagBatchNormConfig>,
}

impl ConvActNorm2dMeta for ConvActNorm2dConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn padding(&self) -> PaddingPolicy {
        self.padding
    }
}

impl ConvActNorm2dConfig {
    /// Enable a norm layer with TensorFlow defaults.
    pub fn with_tf_norm(self) -> Self {
        let norm = tf_batch_norm(self.out_channels);
        self.with_norm(Some(norm))
    }

    /// Initialize a [`ConvActNorm2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvActNorm2d<B> {
        assert!(self.kernel_size > 0, "kernel_size must be > 0");
        assert!(self.stride > 0, "stride must be > 0");

        let conv = Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Valid)
        .with_bias(self.bias)
        .with_initializer(self.initializer.clone());

        ConvActNorm2d {
            padding: Ignored(self.padding),
            conv: conv.init(device),
            act: self.act.as_ref().map(|act| act.init()),
            norm: self.norm.as_ref().map(|norm| {
                FlagBatchNormConfig {
                    num_features: self.out_channels,
                    ..norm.clone()
                }
                .init(device)
            }),
        }
    }
}

/// Sequenced padding/conv/activation/norm block.
///
/// Implements [`ConvActNorm2dMeta`].
#[derive(Module, Debug)]
pub struct ConvActNorm2d<B: Backend> {
    /// Padding policy applied before the conv.
    pub padding: Ignored<PaddingPolicy>,

    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Optional activation layer.
    pub act: Option<Activation>,

    /// Optional norm layer.
    pub norm: Option<FlagBatchNorm<B>>,
}

impl<B: Backend> ConvActNorm2dMeta for ConvActNorm2d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn kernel_size(&self) -> usize {
        self.conv.kernel_size[0]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }

    fn padding(&self) -> PaddingPolicy {
        self.padding.0
    }
}

impl<B: Backend> ConvActNorm2d<B> {
    /// Forward Pass.
    ///
    /// ```rust,ignore
    /// let x = pad(input);
    /// let x = self.conv.forward(x);
    /// let x = self.act.forward(x);
    /// let x = self.norm.forward(x, training);
    /// return x
    /// ```
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    /// - `training`: norm mode; batch statistics when set, running otherwise.
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

        let kernel_size = self.kernel_size();
        let stride = self.stride();
        let x = self
            .padding
            .0
            .apply(input, [kernel_size, kernel_size], [stride, stride], 0.0);
        let x = self.conv.forward(x);

        let x = match &self.act {
            Some(act) => act.forward(x),
            None => x,
        };

        let x = match &self.norm {
            Some(norm) => norm.forward(x, training),
            None => x,
        };

        if let Some([out_height, out_width]) = self.output_resolution([in_height, in_width]) {
            assert_shape_contract!(
                ["batch", "out_channels", "out_height", "out_width"],
                &x,
                &[
                    ("batch", batch),
                    ("out_channels", self.out_channels()),
                    ("out_height", out_height),
                    ("out_width", out_width)
                ]
            );
        }

        x
    }
}

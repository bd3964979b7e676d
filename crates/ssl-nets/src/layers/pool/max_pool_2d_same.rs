//! # `MaxPool2dSame`
//!
//! Max pooling with a [`PaddingPolicy`]; ``'same'`` padding is applied
//! asymmetrically and filled with ``-inf`` so padded cells never win.

use crate::layers::padding::PaddingPolicy;
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::PaddingConfig2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`MaxPool2dSame`] Config.
#[derive(Config, Debug)]
pub struct MaxPool2dSameConfig {
    /// Square kernel size.
    pub kernel_size: usize,

    /// Stride along both axes.
    pub stride: usize,

    /// Padding policy.
    #[config(default = "PaddingPolicy::Same")]
    pub padding: PaddingPolicy,
}

impl MaxPool2dSameConfig {
    /// Initialize a [`MaxPool2dSame`].
    pub fn init(&self) -> MaxPool2dSame {
        assert!(self.kernel_size > 0, "kernel_size must be > 0");
        assert!(self.stride > 0, "stride must be > 0");
        MaxPool2dSame {
            kernel_size: self.kernel_size,
            stride: self.stride,
            padding: Ignored(self.padding),
            pool: MaxPool2dConfig::new([self.kernel_size, self.kernel_size])
                .with_strides([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Valid)
                .init(),
        }
    }

    /// Output resolution for an input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> Option<[usize; 2]> {
        self.padding
            .output_resolution(input_resolution, self.kernel_size, self.stride)
    }
}

/// Max pooling with TensorFlow-style padding.
#[derive(Module, Clone, Debug)]
pub struct MaxPool2dSame {
    kernel_size: usize,
    stride: usize,
    padding: Ignored<PaddingPolicy>,
    pool: MaxPool2d,
}

impl MaxPool2dSame {
    /// The padding policy.
    pub fn padding(&self) -> PaddingPolicy {
        self.padding.0
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, channels, out_height, out_width]``
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.padding.0.apply(
            input,
            [self.kernel_size, self.kernel_size],
            [self.stride, self.stride],
            f32::NEG_INFINITY,
        );
        self.pool.forward(x)
    }
}

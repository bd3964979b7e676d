//! # TensorFlow-style Padding
//!
//! The backbones are specified against ``'same'`` / ``'valid'`` padding,
//! where ``'same'`` pads asymmetrically (the extra row/column goes after)
//! so that ``out = ceil(in / stride)``.

use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};

/// Padding policy for convolution and pooling layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaddingPolicy {
    /// Pad so that ``out = ceil(in / stride)``.
    #[default]
    Same,

    /// No padding; ``out = floor((in - kernel) / stride) + 1``.
    Valid,
}

impl PaddingPolicy {
    /// Output size along one axis.
    ///
    /// # Returns
    ///
    /// `None` if the kernel does not fit the input.
    pub fn output_size(
        self,
        size: usize,
        kernel_size: usize,
        stride: usize,
    ) -> Option<usize> {
        assert!(stride > 0, "stride must be > 0");
        match self {
            PaddingPolicy::Same => {
                if size == 0 {
                    None
                } else {
                    Some(size.div_ceil(stride))
                }
            }
            PaddingPolicy::Valid => {
                if size < kernel_size {
                    None
                } else {
                    Some((size - kernel_size) / stride + 1)
                }
            }
        }
    }

    /// Output resolution for a square kernel.
    pub fn output_resolution(
        self,
        resolution: [usize; 2],
        kernel_size: usize,
        stride: usize,
    ) -> Option<[usize; 2]> {
        let [h, w] = resolution;
        Some([
            self.output_size(h, kernel_size, stride)?,
            self.output_size(w, kernel_size, stride)?,
        ])
    }

    /// Apply the padding policy to an input.
    pub fn apply<B: Backend>(
        self,
        input: Tensor<B, 4>,
        kernel_size: [usize; 2],
        stride: [usize; 2],
        value: f32,
    ) -> Tensor<B, 4> {
        match self {
            PaddingPolicy::Same => pad_same(input, kernel_size, stride, value),
            PaddingPolicy::Valid => input,
        }
    }
}

/// Total ``'same'`` padding along one axis.
///
/// ``max((ceil(size / stride) - 1) * stride + kernel_size - size, 0)``
pub fn get_same_padding(
    size: usize,
    kernel_size: usize,
    stride: usize,
) -> usize {
    let out = size.div_ceil(stride);
    (out.saturating_sub(1) * stride + kernel_size).saturating_sub(size)
}

/// Pad an input with asymmetric ``'same'`` padding.
///
/// # Arguments
///
/// - `input`: ``[batch, channels, height, width]``.
/// - `kernel_size`: ``[kernel_height, kernel_width]``.
/// - `stride`: ``[stride_height, stride_width]``.
/// - `value`: the fill value.
///
/// # Returns
///
/// ``[batch, channels, height + pad_h, width + pad_w]``
pub fn pad_same<B: Backend>(
    input: Tensor<B, 4>,
    kernel_size: [usize; 2],
    stride: [usize; 2],
    value: f32,
) -> Tensor<B, 4> {
    let [_, _, ih, iw] = input.dims();
    let pad_h = get_same_padding(ih, kernel_size[0], stride[0]);
    let pad_w = get_same_padding(iw, kernel_size[1], stride[1]);
    if pad_h == 0 && pad_w == 0 {
        return input;
    }
    input.pad(
        (pad_w / 2, pad_w - pad_w / 2, pad_h / 2, pad_h - pad_h / 2),
        value,
    )
}

//! # Model Utilities
use burn::nn::Initializer;

/// Dense projection initializer (Glorot normal).
pub const DENSE_INITIALIZER: Initializer = Initializer::XavierNormal { gain: 1.0 };

/// He-normal conv initializer for a ``kernel_size x kernel_size`` conv with
/// `filters` output channels.
///
/// ``N(0, std = sqrt(2 / (kernel_size * kernel_size * filters)))``
pub fn he_normal(
    kernel_size: usize,
    filters: usize,
) -> Initializer {
    let fan_out = (kernel_size * kernel_size * filters) as f64;
    Initializer::Normal {
        mean: 0.0,
        std: (2.0 / fan_out).sqrt(),
    }
}

/// Whether a residual shortcut needs a projection.
///
/// The identity is only shape-compatible when the channel count is
/// unchanged and the block does not downsample.
pub fn needs_projection(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
) -> bool {
    stride != 1 || in_channels != out_channels
}

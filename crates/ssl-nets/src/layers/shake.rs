//! # Shake-Shake Branch Mixing
//!
//! Combines two residual branches ``a`` and ``b``:
//!
//! * training: a per-sample random convex combination in the forward pass,
//!   with an independently drawn coefficient for the gradient;
//! * evaluation: the deterministic average ``(a + b) / 2``.
//!
//! The forward/backward split uses a detached difference:
//!
//! ```text
//! mix(alpha) = a + alpha * (b - a)
//! out = detach(mix(alpha) - mix(beta)) + mix(beta)
//! ```

use bimm_contracts::unpack_shape_contract;
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;

/// Mix two branch outputs.
///
/// # Arguments
///
/// - `a`: ``[batch, channels, height, width]``.
/// - `b`: ``[batch, channels, height, width]``.
/// - `training`: enables stochastic mixing.
///
/// # Returns
///
/// ``[batch, channels, height, width]``
pub fn shake_shake<B: Backend>(
    a: Tensor<B, 4>,
    b: Tensor<B, 4>,
    training: bool,
) -> Tensor<B, 4> {
    let [batch, channels, height, width] = unpack_shape_contract!(
        ["batch", "channels", "height", "width"],
        &a,
        &["batch", "channels", "height", "width"],
        &[]
    );
    assert_eq!(
        b.dims(),
        [batch, channels, height, width],
        "shake-shake branches must have equal shapes"
    );

    if !training {
        return (a + b) * 0.5;
    }

    let device = a.device();
    let alpha = Tensor::<B, 4>::random([batch, 1, 1, 1], Distribution::Uniform(0.0, 1.0), &device);
    let beta = Tensor::<B, 4>::random([batch, 1, 1, 1], Distribution::Uniform(0.0, 1.0), &device);

    let diff = b - a.clone();
    let mix_forward = a.clone() + alpha * diff.clone();
    let mix_backward = a + beta * diff;

    (mix_forward - mix_backward.clone()).detach() + mix_backward
}

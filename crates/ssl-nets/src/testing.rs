//! Shared test helpers.

use burn::backend::{Autodiff, NdArray};
use burn::prelude::{Backend, Tensor};

/// Inference test backend.
pub type TestBackend = NdArray<f32>;

/// Training test backend.
pub type TestAutodiffBackend = Autodiff<NdArray<f32>>;

/// Read a tensor back as a flat ``f32`` vector.
pub fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .expect("tensor data should convert to f32")
}

/// Element-wise closeness check with a useful failure message.
pub fn assert_all_close(
    actual: &[f32],
    expected: &[f32],
    tolerance: f32,
) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (idx, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "value[{idx}]: {a} !~ {e} (tolerance {tolerance})"
        );
    }
}

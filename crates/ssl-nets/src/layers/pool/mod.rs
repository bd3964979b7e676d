//! Pooling layers.

mod max_pool_2d_same;

pub use max_pool_2d_same::*;

use burn::prelude::{Backend, Tensor};

/// Global average pooling over the spatial axes.
///
/// Maps ``[batch, channels, height, width]`` to ``[batch, channels]``.
pub fn global_avg_pool<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 2> {
    let x = input.mean_dim(3).mean_dim(2);
    x.flatten::<2>(1, 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestBackend, assert_all_close, tensor_values};
    use burn::tensor::TensorData;

    #[test]
    fn test_global_avg_pool() {
        let device = Default::default();
        let input: Tensor<TestBackend, 4> = Tensor::from_data(
            TensorData::new(
                vec![1.0f32, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 8.0],
                [1, 2, 2, 2],
            ),
            &device,
        );
        let output = global_avg_pool(input);
        assert_eq!(output.dims(), [1, 2]);
        assert_all_close(&tensor_values(output), &[2.5, 2.0], 1e-6);
    }
}

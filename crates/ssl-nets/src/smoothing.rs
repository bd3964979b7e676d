//! # Label Smoothing
//!
//! ```text
//! smooth(labels) = labels - smoothing * (labels - 1 / num_classes)
//! ```
//!
//! Independent of the classifier topology; the harness applies it to the
//! label batch before computing the supervised loss.

use crate::error::{ArchError, Result};
use burn::prelude::{Backend, Tensor};

fn check_smoothing(smoothing: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&smoothing) {
        return Err(ArchError::invalid_hyperparameter(
            "smoothing",
            smoothing,
            "0.0 <= smoothing <= 1.0",
        ));
    }
    Ok(())
}

/// Smooth a ``[batch, num_classes]`` label distribution toward uniform.
///
/// `smoothing == 0` is the identity; `smoothing == 1` yields the uniform
/// distribution for one-hot labels.
///
/// # Returns
///
/// * [`ArchError::InvalidHyperparameter`] if `smoothing` is outside ``[0, 1]``
///   or `num_classes` is zero;
/// * [`ArchError::ShapeMismatch`] if the labels are not ``[batch, num_classes]``.
pub fn smooth_labels<B: Backend>(
    labels: Tensor<B, 2>,
    smoothing: f64,
    num_classes: usize,
) -> Result<Tensor<B, 2>> {
    check_smoothing(smoothing)?;
    if num_classes == 0 {
        return Err(ArchError::invalid_hyperparameter(
            "num_classes",
            num_classes,
            "num_classes >= 1",
        ));
    }
    let [batch, width] = labels.dims();
    if width != num_classes {
        return Err(ArchError::ShapeMismatch {
            architecture: "label smoothing".to_string(),
            expected: format!("[batch, {num_classes}]"),
            actual: vec![batch, width],
        });
    }
    if smoothing == 0.0 {
        return Ok(labels);
    }

    let uniform = 1.0 / num_classes as f64;
    let delta = labels.clone().sub_scalar(uniform).mul_scalar(smoothing);
    Ok(labels - delta)
}

/// Batch augmentation hook.
///
/// Returns the input batch untouched, alongside the smoothed labels.
pub fn augment<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    labels: Tensor<B, 2>,
    smoothing: f64,
) -> Result<(Tensor<B, D>, Tensor<B, 2>)> {
    let num_classes = labels.dims()[1];
    let labels = smooth_labels(labels, smoothing, num_classes)?;
    Ok((input, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestBackend, assert_all_close, tensor_values};
    use burn::tensor::{Distribution, TensorData};

    fn one_hot(
        classes: &[usize],
        num_classes: usize,
    ) -> Tensor<TestBackend, 2> {
        let mut data = vec![0.0f32; classes.len() * num_classes];
        for (row, class) in classes.iter().enumerate() {
            data[row * num_classes + class] = 1.0;
        }
        Tensor::from_data(
            TensorData::new(data, [classes.len(), num_classes]),
            &Default::default(),
        )
    }

    #[test]
    fn test_zero_smoothing_is_identity() {
        let device = Default::default();
        let labels: Tensor<TestBackend, 2> =
            Tensor::random([4, 5], Distribution::Default, &device);
        let smoothed = smooth_labels(labels.clone(), 0.0, 5).unwrap();
        assert_eq!(tensor_values(smoothed), tensor_values(labels));
    }

    #[test]
    fn test_full_smoothing_is_uniform() {
        let labels = one_hot(&[0, 3, 1], 4);
        let smoothed = smooth_labels(labels, 1.0, 4).unwrap();
        assert_all_close(&tensor_values(smoothed), &[0.25; 12], 1e-6);
    }

    #[test]
    fn test_partial_smoothing() {
        let labels = one_hot(&[1], 2);
        let smoothed = smooth_labels(labels, 0.2, 2).unwrap();
        assert_all_close(&tensor_values(smoothed), &[0.1, 0.9], 1e-6);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let labels = one_hot(&[0], 3);
        assert!(matches!(
            smooth_labels(labels.clone(), 1.5, 3),
            Err(ArchError::InvalidHyperparameter {
                name: "smoothing",
                ..
            })
        ));
        assert!(matches!(
            smooth_labels(labels.clone(), -0.1, 3),
            Err(ArchError::InvalidHyperparameter {
                name: "smoothing",
                ..
            })
        ));
        assert!(matches!(
            smooth_labels(labels.clone(), 0.1, 0),
            Err(ArchError::InvalidHyperparameter {
                name: "num_classes",
                ..
            })
        ));
        assert!(matches!(
            smooth_labels(labels, 0.1, 4),
            Err(ArchError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_augment_passes_input_through() {
        let device = Default::default();
        let input: Tensor<TestBackend, 4> =
            Tensor::random([3, 1, 2, 2], Distribution::Default, &device);
        let labels = one_hot(&[0, 1, 2], 3);

        let (x, y) = augment(input.clone(), labels, 1.0).unwrap();
        assert_eq!(tensor_values(x), tensor_values(input));
        assert_all_close(&tensor_values(y), &[1.0 / 3.0; 9], 1e-6);
    }
}

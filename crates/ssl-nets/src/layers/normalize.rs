//! # Input Normalization
//!
//! Every topology standardizes its input with the dataset's per-channel
//! statistics before the first convolution:
//!
//! ```text
//! y[b, c, h, w] = (x[b, c, h, w] - mean[c]) / std[c]
//! ```

use crate::error::{ArchError, Result};
use bimm_contracts::assert_shape_contract;
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::prelude::{Backend, Tensor};
use burn::tensor::TensorData;

/// Per-channel dataset statistics.
///
/// Supplied by the data pipeline; read-only to the classifiers.
#[derive(Config, Debug)]
pub struct DatasetStatistics {
    /// Per-channel mean.
    pub mean: Vec<f32>,

    /// Per-channel standard deviation.
    pub std: Vec<f32>,
}

impl DatasetStatistics {
    /// Statistics which leave the input unchanged.
    pub fn identity(channels: usize) -> Self {
        Self::new(vec![0.0; channels], vec![1.0; channels])
    }

    /// Commonly used CIFAR-10 RGB statistics, for ``[0, 1]`` scaled pixels.
    pub fn cifar10() -> Self {
        Self::new(vec![0.4914, 0.4822, 0.4465], vec![0.2470, 0.2435, 0.2616])
    }

    /// Number of channels described.
    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    /// Check that the statistics are usable.
    pub fn validate(&self) -> Result<()> {
        if self.mean.is_empty() {
            return Err(ArchError::InvalidStatistics(
                "statistics describe zero channels".to_string(),
            ));
        }
        if self.mean.len() != self.std.len() {
            return Err(ArchError::InvalidStatistics(format!(
                "mean has {} channels, std has {}",
                self.mean.len(),
                self.std.len()
            )));
        }
        if let Some((idx, std)) = self
            .std
            .iter()
            .enumerate()
            .find(|(_, s)| !(s.is_finite() && **s > 0.0))
        {
            return Err(ArchError::InvalidStatistics(format!(
                "std[{idx}]={std} must be finite and > 0"
            )));
        }
        if let Some((idx, mean)) = self.mean.iter().enumerate().find(|(_, m)| !m.is_finite()) {
            return Err(ArchError::InvalidStatistics(format!(
                "mean[{idx}]={mean} must be finite"
            )));
        }
        Ok(())
    }
}

/// [`InputNormalization`] Config.
#[derive(Config, Debug)]
pub struct InputNormalizationConfig {
    /// The dataset statistics.
    pub stats: DatasetStatistics,
}

impl InputNormalizationConfig {
    /// Initialize an [`InputNormalization`] layer.
    ///
    /// # Panics
    ///
    /// If the statistics are invalid.
    pub fn init(self) -> InputNormalization {
        if let Err(err) = self.stats.validate() {
            panic!("{err}");
        }
        InputNormalization {
            stats: Ignored(self.stats),
        }
    }
}

/// Fixed (non-learned) per-channel standardization.
#[derive(Module, Clone, Debug)]
pub struct InputNormalization {
    stats: Ignored<DatasetStatistics>,
}

impl InputNormalization {
    /// Number of channels expected.
    pub fn channels(&self) -> usize {
        self.stats.0.channels()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, channels, height, width]``
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let channels = self.channels();
        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &input,
            &[("channels", channels)]
        );
        let device = input.device();

        let mean = Tensor::<B, 1>::from_data(
            TensorData::new(self.stats.0.mean.clone(), [channels]),
            &device,
        )
        .reshape([1, channels, 1, 1]);
        let std = Tensor::<B, 1>::from_data(
            TensorData::new(self.stats.0.std.clone(), [channels]),
            &device,
        )
        .reshape([1, channels, 1, 1]);

        (input - mean) / std
    }
}

//! # Shake-Shake `ResNet` Core Model
//!
//! ```text
//! conv3x3 16 (no bias)
//! for scale in 0..scales, idx in 0..repeat:
//!     ShakeBlock(filters << scale, stride = 2 if idx == 0 and scale > 0)
//! global average pool = embedding
//! dropout (training) -> dense = logits
//! ```

use crate::error::{ArchError, Result};
use crate::hparams::{ClassifierHyperparameters, ClassifierTask};
use crate::layers::blocks::conv_act_norm::{ConvActNorm2d, ConvActNorm2dConfig};
use crate::layers::drop::dropout::{FlagDropout, FlagDropoutConfig};
use crate::layers::normalize::{DatasetStatistics, InputNormalization, InputNormalizationConfig};
use crate::layers::pool::global_avg_pool;
use crate::models::shakenet::shake_block::{ShakeBlock, ShakeBlockConfig};
use crate::models::util::{DENSE_INITIALIZER, he_normal};
use crate::models::{ClassifierMeta, ClassifierOutput, InputRequirement};
use bimm_contracts::unpack_shape_contract;
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::{Backend, Tensor};

/// [`ShakeNet`] Config.
#[derive(Config, Debug)]
pub struct ShakeNetConfig {
    /// Number of output classes.
    pub num_classes: usize,

    /// Input statistics.
    pub stats: DatasetStatistics,

    /// Number of stages; each stage after the first halves the resolution.
    #[config(default = 3)]
    pub scales: usize,

    /// Width of the first stage; doubled per stage.
    #[config(default = 32)]
    pub filters: usize,

    /// Blocks per stage.
    #[config(default = 4)]
    pub repeat: usize,

    /// Dropout probability before the dense layer.
    #[config(default = "0.0")]
    pub dropout: f64,

    /// Stem conv width.
    #[config(default = 16)]
    pub stem_channels: usize,
}

impl ClassifierMeta for ShakeNetConfig {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn in_channels(&self) -> usize {
        self.stats.channels()
    }

    fn embedding_dim(&self) -> usize {
        self.filters << (self.scales.max(1) - 1)
    }

    fn input_requirement(&self) -> InputRequirement {
        let reduction = self.reduction_factor();
        InputRequirement {
            channels: self.in_channels(),
            min_resolution: [reduction; 2],
            multiple_of: reduction,
        }
    }
}

impl ShakeNetConfig {
    /// Build a config from the shared hyperparameters.
    ///
    /// Reads `scales`, `filters`, `repeat` and `dropout`.
    pub fn from_hparams(
        task: &ClassifierTask,
        hparams: &ClassifierHyperparameters,
    ) -> Result<Self> {
        hparams.validate()?;
        let config = Self::new(task.num_classes, task.stats.clone())
            .with_scales(hparams.scales)
            .with_filters(hparams.filters)
            .with_repeat(hparams.repeat)
            .with_dropout(hparams.dropout);
        config.try_validate()?;
        Ok(config)
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(ArchError::invalid_hyperparameter(
                "num_classes",
                self.num_classes,
                "num_classes >= 1",
            ));
        }
        for (name, value) in [
            ("scales", self.scales),
            ("filters", self.filters),
            ("repeat", self.repeat),
            ("stem_channels", self.stem_channels),
        ] {
            if value == 0 {
                return Err(ArchError::invalid_hyperparameter(
                    name,
                    value,
                    format!("{name} >= 1"),
                ));
            }
        }
        if self.scales > 16 {
            return Err(ArchError::invalid_hyperparameter(
                "scales",
                self.scales,
                "scales <= 16",
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ArchError::invalid_hyperparameter(
                "dropout",
                self.dropout,
                "0.0 <= dropout < 1.0",
            ));
        }
        self.stats.validate()
    }

    /// Total resolution reduction: ``2 ** (scales - 1)``.
    pub fn reduction_factor(&self) -> usize {
        1 << (self.scales.max(1) - 1)
    }

    /// The residual block configs, in order.
    pub fn block_configs(&self) -> Vec<ShakeBlockConfig> {
        let mut blocks = Vec::with_capacity(self.scales * self.repeat);
        let mut in_channels = self.stem_channels;
        for scale in 0..self.scales {
            let out_channels = self.filters << scale;
            for idx in 0..self.repeat {
                let stride = if idx == 0 && scale > 0 { 2 } else { 1 };
                blocks.push(ShakeBlockConfig::new(in_channels, out_channels).with_stride(stride));
                in_channels = out_channels;
            }
        }
        blocks
    }

    /// Initialize a [`ShakeNet`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ShakeNet<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
        let width = self.embedding_dim();

        ShakeNet {
            normalize: InputNormalizationConfig::new(self.stats.clone()).init(),
            stem: ConvActNorm2dConfig::new(self.in_channels(), self.stem_channels, 3)
                .with_bias(false)
                .with_initializer(he_normal(3, self.stem_channels))
                .init(device),
            blocks: self
                .block_configs()
                .iter()
                .map(|block| block.init(device))
                .collect(),
            dropout: FlagDropoutConfig::new(self.dropout).init(),
            fc: LinearConfig::new(width, self.num_classes)
                .with_initializer(DENSE_INITIALIZER)
                .init(device),
        }
    }
}

/// Shake-Shake `ResNet` classifier.
#[derive(Module, Debug)]
pub struct ShakeNet<B: Backend> {
    normalize: InputNormalization,
    stem: ConvActNorm2d<B>,
    blocks: Vec<ShakeBlock<B>>,
    dropout: FlagDropout,
    fc: Linear<B>,
}

impl<B: Backend> ClassifierMeta for ShakeNet<B> {
    fn num_classes(&self) -> usize {
        self.fc.weight.shape().dims[1]
    }

    fn in_channels(&self) -> usize {
        self.normalize.channels()
    }

    fn embedding_dim(&self) -> usize {
        self.fc.weight.shape().dims[0]
    }

    fn input_requirement(&self) -> InputRequirement {
        let reduction = self.reduction_factor();
        InputRequirement {
            channels: self.in_channels(),
            min_resolution: [reduction; 2],
            multiple_of: reduction,
        }
    }
}

impl<B: Backend> ShakeNet<B> {
    /// The residual blocks, in order.
    pub fn blocks(&self) -> &[ShakeBlock<B>] {
        &self.blocks
    }

    /// Total resolution reduction of the blocks.
    pub fn reduction_factor(&self) -> usize {
        self.blocks.iter().map(|block| block.stride()).product()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    /// - `training`: enables shake-shake mixing and dropout; selects batch-norm mode.
    ///
    /// # Returns
    ///
    /// ``logits: [batch, num_classes]``, ``embedding: [batch, filters << (scales - 1)]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        training: bool,
    ) -> ClassifierOutput<B> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.normalize.forward(input);
        let mut x = self.stem.forward(x, training);
        for block in &self.blocks {
            x = block.forward(x, training);
        }

        let embedding = global_avg_pool(x);
        let x = self.dropout.forward(embedding.clone(), training);
        let logits = self.fc.forward(x);
        assert_eq!(logits.dims(), [batch, self.num_classes()]);

        ClassifierOutput { logits, embedding }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestAutodiffBackend, TestBackend};
    use burn::tensor::Distribution;

    fn small_config() -> ShakeNetConfig {
        ShakeNetConfig::new(5, DatasetStatistics::cifar10())
            .with_filters(4)
            .with_repeat(2)
    }

    #[test]
    fn test_block_layout() {
        let blocks = small_config().block_configs();
        let summary: Vec<(usize, usize, usize)> = blocks
            .iter()
            .map(|b| (b.in_channels, b.out_channels, b.stride))
            .collect();
        assert_eq!(
            summary,
            vec![
                (16, 4, 1),
                (4, 4, 1),
                (4, 8, 2),
                (8, 8, 1),
                (8, 16, 2),
                (16, 16, 1),
            ]
        );
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let config = small_config();
        let model: ShakeNet<TestBackend> = config.init(&device);
        assert_eq!(model.reduction_factor(), 4);
        assert_eq!(model.embedding_dim(), 16);

        let input = Tensor::random([2, 3, 16, 16], Distribution::Default, &device);
        let output = model.forward(input.clone(), true);
        assert_eq!(output.logits.dims(), [2, 5]);
        assert_eq!(output.embedding.dims(), [2, 16]);
    }

    #[test]
    fn test_eval_is_deterministic() {
        let device = Default::default();
        let model: ShakeNet<TestAutodiffBackend> =
            small_config().with_dropout(0.5).init(&device);
        let input = Tensor::random([2, 3, 8, 8], Distribution::Default, &device);

        let first = model.forward(input.clone(), false);
        let second = model.forward(input, false);
        first.logits.to_data().assert_eq(&second.logits.to_data(), true);
        first
            .embedding
            .to_data()
            .assert_eq(&second.embedding.to_data(), true);
    }
}

//! # Wide `ResNet` Core Model
//!
//! ```text
//! conv3x3 16
//! for scale in 0..scales:
//!     PreActBlock(filters << scale, stride = 2 if scale > 0)
//!     (repeat - 1) x PreActBlock(filters << scale)
//! leaky_relu(bn(x)) -> global average pool = embedding
//! dropout (training) -> dense = logits
//! ```
//!
//! Every strided conv pads TF-style ``same``, so any input resolution is
//! accepted; the final feature map is ``ceil(in / 2 ** (scales - 1))`` wide.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::error::{ArchError, Result};
use crate::hparams::{ClassifierHyperparameters, ClassifierTask};
use crate::layers::blocks::conv_act_norm::{ConvActNorm2d, ConvActNorm2dConfig};
use crate::layers::drop::dropout::{FlagDropout, FlagDropoutConfig};
use crate::layers::norm::batch_norm::{FlagBatchNorm, tf_batch_norm};
use crate::layers::normalize::{DatasetStatistics, InputNormalization, InputNormalizationConfig};
use crate::layers::pool::global_avg_pool;
use crate::models::resnet::residual_block::{PreActBlock, PreActBlockConfig, PreActBlockMeta};
use crate::models::util::{DENSE_INITIALIZER, he_normal};
use crate::models::{ClassifierMeta, ClassifierOutput, InputRequirement};
use bimm_contracts::unpack_shape_contract;
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::{Backend, Tensor};

/// [`ResNet`] Config.
#[derive(Config, Debug)]
pub struct ResNetConfig {
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

    /// Leaky-relu negative slope.
    #[config(default = "0.1")]
    pub negative_slope: f64,
}

impl ClassifierMeta for ResNetConfig {
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
        InputRequirement {
            channels: self.in_channels(),
            min_resolution: [1; 2],
            multiple_of: 1,
        }
    }
}

impl ResNetConfig {
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
    pub fn block_configs(&self) -> Vec<PreActBlockConfig> {
        let mut blocks = Vec::with_capacity(self.scales * self.repeat);
        let mut in_channels = self.stem_channels;
        for scale in 0..self.scales {
            let out_channels = self.filters << scale;
            for idx in 0..self.repeat {
                let first = idx == 0;
                blocks.push(
                    PreActBlockConfig::new(in_channels, out_channels)
                        .with_stride(if first && scale > 0 { 2 } else { 1 })
                        .with_activate_before_residual(first && scale == 0)
                        .with_negative_slope(self.negative_slope),
                );
                in_channels = out_channels;
            }
        }
        blocks
    }

    /// Initialize a [`ResNet`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNet<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
        let width = self.embedding_dim();

        ResNet {
            normalize: InputNormalizationConfig::new(self.stats.clone()).init(),
            stem: ConvActNorm2dConfig::new(self.in_channels(), self.stem_channels, 3)
                .with_initializer(he_normal(3, self.stem_channels))
                .init(device),
            blocks: self
                .block_configs()
                .iter()
                .map(|block| block.init(device))
                .collect(),
            norm: tf_batch_norm(width).init(device),
            act: ActivationConfig::leaky_relu(self.negative_slope).init(),
            dropout: FlagDropoutConfig::new(self.dropout).init(),
            fc: LinearConfig::new(width, self.num_classes)
                .with_initializer(DENSE_INITIALIZER)
                .init(device),
        }
    }
}

/// Wide pre-activation `ResNet` classifier.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    normalize: InputNormalization,
    stem: ConvActNorm2d<B>,
    blocks: Vec<PreActBlock<B>>,
    norm: FlagBatchNorm<B>,
    act: Activation,
    dropout: FlagDropout,
    fc: Linear<B>,
}

impl<B: Backend> ClassifierMeta for ResNet<B> {
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
        InputRequirement {
            channels: self.in_channels(),
            min_resolution: [1; 2],
            multiple_of: 1,
        }
    }
}

impl<B: Backend> ResNet<B> {
    /// The residual blocks, in order.
    pub fn blocks(&self) -> &[PreActBlock<B>] {
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
    /// - `training`: enables dropout; selects batch-norm mode.
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
        let x = self.act.forward(self.norm.forward(x, training));

        let embedding = global_avg_pool(x);
        let x = self.dropout.forward(embedding.clone(), training);
        let logits = self.fc.forward(x);
        assert_eq!(logits.dims(), [batch, self.num_classes()]);

        ClassifierOutput { logits, embedding }
    }
}

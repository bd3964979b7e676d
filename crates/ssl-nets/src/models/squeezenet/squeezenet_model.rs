//! # `SqueezeNet` Family
//!
//! One parameterized topology covers the four registered variants:
//!
//! | variant  | stem conv    | stem pool        | body                                         |
//! |----------|--------------|------------------|----------------------------------------------|
//! | `Full`   | 3x3/2 valid  | 3x3/2 same       | fire16 x2, pool 3/2, fire32 x2, pool 3/2, fire48 x2, fire64 x2 |
//! | `Cifar`  | 3x3/2 valid  | 3x3/2 same       | fire16 x2, pool 2/1, fire32 x2, pool 2/1, fire48 x2, fire64 x2 |
//! | `Mini`   | 3x3/2 valid  | 3x3/2 valid      | fire16 x2, fire32 x2                         |
//! | `Mini1`  | 3x3/1 valid  | 3x3/2 valid      | fire16 x2, fire32 x2                         |
//!
//! where ``fireN`` squeezes to ``N`` channels and expands to ``4N + 4N``.
//!
//! Head: ``dropout (training) -> conv1x1 num_classes -> relu -> global average pool``;
//! the pooled head output is the logits, and the pooled body output is
//! the embedding.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::error::{ArchError, Result};
use crate::hparams::{ClassifierHyperparameters, ClassifierTask};
use crate::layers::blocks::conv_act_norm::{ConvActNorm2d, ConvActNorm2dConfig, ConvActNorm2dMeta};
use crate::layers::drop::dropout::{FlagDropout, FlagDropoutConfig};
use crate::layers::normalize::{DatasetStatistics, InputNormalization, InputNormalizationConfig};
use crate::layers::padding::PaddingPolicy;
use crate::layers::pool::{MaxPool2dSame, MaxPool2dSameConfig, global_avg_pool};
use crate::models::squeezenet::fire::{Fire, FireConfig};
use crate::models::{ClassifierMeta, ClassifierOutput, InputRequirement};
use bimm_contracts::unpack_shape_contract;
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};

/// The `SqueezeNet` layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqueezeNetVariant {
    /// Three strided pools, eight fire modules.
    Full,

    /// As `Full`, with the body pools reduced to 2x2 stride 1 for 32x32 inputs.
    Cifar,

    /// Four fire modules, no body pools.
    Mini,

    /// As `Mini`, with a stride 1 stem conv.
    Mini1,
}

impl SqueezeNetVariant {
    /// All variants.
    pub const ALL: [SqueezeNetVariant; 4] = [Self::Full, Self::Cifar, Self::Mini, Self::Mini1];

    /// Stride of the stem conv.
    pub fn stem_stride(self) -> usize {
        match self {
            Self::Mini1 => 1,
            _ => 2,
        }
    }

    /// The pool following the stem conv.
    pub fn stem_pool(self) -> MaxPool2dSameConfig {
        let padding = match self {
            Self::Full | Self::Cifar => PaddingPolicy::Same,
            Self::Mini | Self::Mini1 => PaddingPolicy::Valid,
        };
        MaxPool2dSameConfig::new(3, 2).with_padding(padding)
    }

    /// The pool between fire stages, if any.
    pub fn body_pool(self) -> Option<MaxPool2dSameConfig> {
        match self {
            Self::Full => Some(MaxPool2dSameConfig::new(3, 2)),
            Self::Cifar => Some(MaxPool2dSameConfig::new(2, 1)),
            Self::Mini | Self::Mini1 => None,
        }
    }

    /// Squeeze widths of the fire stages; each stage is two fire modules.
    pub fn fire_stages(self) -> &'static [usize] {
        match self {
            Self::Full | Self::Cifar => &[16, 32, 48, 64],
            Self::Mini | Self::Mini1 => &[16, 32],
        }
    }

    /// Number of leading stages followed by a body pool.
    fn pooled_stages(self) -> usize {
        match self {
            Self::Full | Self::Cifar => 2,
            Self::Mini | Self::Mini1 => 0,
        }
    }

    /// Smallest accepted input side.
    pub fn min_resolution(self) -> usize {
        match self {
            Self::Full | Self::Cifar => 3,
            Self::Mini => 7,
            Self::Mini1 => 5,
        }
    }
}

/// One step of the `SqueezeNet` body.
#[derive(Config, Debug)]
pub enum SqueezeLayerConfig {
    /// A fire module.
    Fire(FireConfig),

    /// A max pool.
    Pool(MaxPool2dSameConfig),
}

impl SqueezeLayerConfig {
    /// Initialize a [`SqueezeLayer`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SqueezeLayer<B> {
        match self {
            Self::Fire(config) => SqueezeLayer::Fire(config.init(device)),
            Self::Pool(config) => SqueezeLayer::Pool(config.init()),
        }
    }
}

/// One step of the `SqueezeNet` body.
#[derive(Module, Debug)]
pub enum SqueezeLayer<B: Backend> {
    /// A fire module.
    Fire(Fire<B>),

    /// A max pool.
    Pool(MaxPool2dSame),
}

impl<B: Backend> SqueezeLayer<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        training: bool,
    ) -> Tensor<B, 4> {
        match self {
            Self::Fire(fire) => fire.forward(input, training),
            Self::Pool(pool) => pool.forward(input),
        }
    }
}

/// [`SqueezeNet`] Config.
#[derive(Config, Debug)]
pub struct SqueezeNetConfig {
    /// Number of output classes.
    pub num_classes: usize,

    /// Input statistics.
    pub stats: DatasetStatistics,

    /// Layout variant.
    #[config(default = "SqueezeNetVariant::Full")]
    pub variant: SqueezeNetVariant,

    /// Stem conv width.
    #[config(default = 64)]
    pub stem_channels: usize,

    /// Dropout probability before the head conv.
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl ClassifierMeta for SqueezeNetConfig {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn in_channels(&self) -> usize {
        self.stats.channels()
    }

    fn embedding_dim(&self) -> usize {
        self.body_channels()
    }

    fn input_requirement(&self) -> InputRequirement {
        InputRequirement {
            channels: self.in_channels(),
            min_resolution: [self.variant.min_resolution(); 2],
            multiple_of: 1,
        }
    }
}

impl SqueezeNetConfig {
    /// Build a config from the shared hyperparameters.
    ///
    /// The layout is fixed by the variant; only the shared ranges are checked.
    pub fn from_hparams(
        variant: SqueezeNetVariant,
        task: &ClassifierTask,
        hparams: &ClassifierHyperparameters,
    ) -> Result<Self> {
        hparams.validate()?;
        let config = Self::new(task.num_classes, task.stats.clone()).with_variant(variant);
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
        if self.stem_channels == 0 {
            return Err(ArchError::invalid_hyperparameter(
                "stem_channels",
                self.stem_channels,
                "stem_channels >= 1",
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

    /// The body layer configs, in order.
    pub fn layer_configs(&self) -> Vec<SqueezeLayerConfig> {
        let mut layers = Vec::new();
        let mut in_channels = self.stem_channels;
        let pooled = self.variant.pooled_stages();

        for (idx, &squeeze) in self.variant.fire_stages().iter().enumerate() {
            let expand = 4 * squeeze;
            for _ in 0..2 {
                layers.push(SqueezeLayerConfig::Fire(FireConfig::new(
                    in_channels,
                    squeeze,
                    expand,
                    expand,
                )));
                in_channels = 2 * expand;
            }
            if idx < pooled {
                if let Some(pool) = self.variant.body_pool() {
                    layers.push(SqueezeLayerConfig::Pool(pool));
                }
            }
        }
        layers
    }

    /// Channel width of the body output.
    pub fn body_channels(&self) -> usize {
        self.variant
            .fire_stages()
            .last()
            .map(|squeeze| 8 * squeeze)
            .unwrap_or(self.stem_channels)
    }

    /// Initialize a [`SqueezeNet`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SqueezeNet<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
        let relu = Some(ActivationConfig::Relu);

        SqueezeNet {
            variant: Ignored(self.variant),
            normalize: InputNormalizationConfig::new(self.stats.clone()).init(),
            stem: ConvActNorm2dConfig::new(self.in_channels(), self.stem_channels, 3)
                .with_stride(self.variant.stem_stride())
                .with_padding(PaddingPolicy::Valid)
                .with_act(relu.clone())
                .init(device),
            stem_pool: self.variant.stem_pool().init(),
            layers: self
                .layer_configs()
                .iter()
                .map(|layer| layer.init(device))
                .collect(),
            dropout: FlagDropoutConfig::new(self.dropout).init(),
            head: ConvActNorm2dConfig::new(self.body_channels(), self.num_classes, 1)
                .with_act(relu)
                .init(device),
        }
    }
}

/// `SqueezeNet` classifier.
#[derive(Module, Debug)]
pub struct SqueezeNet<B: Backend> {
    variant: Ignored<SqueezeNetVariant>,
    normalize: InputNormalization,
    stem: ConvActNorm2d<B>,
    stem_pool: MaxPool2dSame,
    layers: Vec<SqueezeLayer<B>>,
    dropout: FlagDropout,
    head: ConvActNorm2d<B>,
}

impl<B: Backend> ClassifierMeta for SqueezeNet<B> {
    fn num_classes(&self) -> usize {
        self.head.out_channels()
    }

    fn in_channels(&self) -> usize {
        self.normalize.channels()
    }

    fn embedding_dim(&self) -> usize {
        self.head.in_channels()
    }

    fn input_requirement(&self) -> InputRequirement {
        InputRequirement {
            channels: self.in_channels(),
            min_resolution: [self.variant.0.min_resolution(); 2],
            multiple_of: 1,
        }
    }
}

impl<B: Backend> SqueezeNet<B> {
    /// The layout variant.
    pub fn variant(&self) -> SqueezeNetVariant {
        self.variant.0
    }

    /// The body layers, in order.
    pub fn layers(&self) -> &[SqueezeLayer<B>] {
        &self.layers
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    /// - `training`: enables dropout.
    ///
    /// # Returns
    ///
    /// ``logits: [batch, num_classes]``, ``embedding: [batch, body_channels]``.
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
        let x = self.stem.forward(x, training);
        let mut x = self.stem_pool.forward(x);
        for layer in &self.layers {
            x = layer.forward(x, training);
        }

        let embedding = global_avg_pool(x.clone());
        let x = self.dropout.forward(x, training);
        let logits = global_avg_pool(self.head.forward(x, training));
        assert_eq!(logits.dims(), [batch, self.num_classes()]);

        ClassifierOutput { logits, embedding }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::squeezenet::fire::FireMeta;
    use crate::testing::TestBackend;
    use burn::tensor::Distribution;

    fn config(variant: SqueezeNetVariant) -> SqueezeNetConfig {
        SqueezeNetConfig::new(10, DatasetStatistics::cifar10()).with_variant(variant)
    }

    fn fire_widths(config: &SqueezeNetConfig) -> Vec<(usize, usize)> {
        config
            .layer_configs()
            .iter()
            .filter_map(|layer| match layer {
                SqueezeLayerConfig::Fire(fire) => Some((fire.in_channels, fire.out_channels())),
                SqueezeLayerConfig::Pool(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_layouts() {
        let full = config(SqueezeNetVariant::Full);
        assert_eq!(full.layer_configs().len(), 10);
        assert_eq!(
            fire_widths(&full),
            vec![
                (64, 128),
                (128, 128),
                (128, 256),
                (256, 256),
                (256, 384),
                (384, 384),
                (384, 512),
                (512, 512),
            ]
        );
        assert_eq!(full.embedding_dim(), 512);

        let cifar = config(SqueezeNetVariant::Cifar);
        let pools: Vec<usize> = cifar
            .layer_configs()
            .iter()
            .filter_map(|layer| match layer {
                SqueezeLayerConfig::Pool(pool) => Some(pool.stride),
                SqueezeLayerConfig::Fire(_) => None,
            })
            .collect();
        assert_eq!(pools, vec![1, 1]);

        for variant in [SqueezeNetVariant::Mini, SqueezeNetVariant::Mini1] {
            let mini = config(variant);
            assert_eq!(mini.layer_configs().len(), 4);
            assert_eq!(mini.embedding_dim(), 256);
        }
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        for variant in SqueezeNetVariant::ALL {
            let config = config(variant);
            let model: SqueezeNet<TestBackend> = config.init(&device);
            assert_eq!(model.variant(), variant);
            assert_eq!(model.embedding_dim(), config.embedding_dim());

            let input = Tensor::random([2, 3, 32, 32], Distribution::Default, &device);
            let output = model.forward(input, false);
            assert_eq!(output.logits.dims(), [2, 10], "{variant:?}");
            assert_eq!(output.embedding.dims(), [2, config.embedding_dim()], "{variant:?}");

            let min = variant.min_resolution();
            let input = Tensor::random([1, 3, min, min], Distribution::Default, &device);
            let output = model.forward(input, true);
            assert_eq!(output.logits.dims(), [1, 10], "{variant:?}");
        }
    }

    #[test]
    fn test_head_dropout_follows_training_flag() {
        let device = Default::default();
        let model: SqueezeNet<TestBackend> = config(SqueezeNetVariant::Mini)
            .with_dropout(0.5)
            .init(&device);
        let input = Tensor::random([2, 3, 16, 16], Distribution::Default, &device);
        let run = |training: bool| {
            let output = model.forward(input.clone(), training);
            (
                output.logits.into_data().to_vec::<f32>().unwrap(),
                output.embedding.into_data().to_vec::<f32>().unwrap(),
            )
        };

        let (eval_logits, eval_embedding) = run(false);
        let (again_logits, _) = run(false);
        let (train_logits, train_embedding) = run(true);

        assert_eq!(eval_logits, again_logits);
        assert_ne!(eval_logits, train_logits);
        // The embedding is read before the dropout.
        assert_eq!(eval_embedding, train_embedding);
    }

    #[test]
    fn test_logits_are_non_negative() {
        let device = Default::default();
        let model: SqueezeNet<TestBackend> = config(SqueezeNetVariant::Mini).init(&device);
        let input = Tensor::random([2, 3, 16, 16], Distribution::Default, &device);
        let output = model.forward(input, false);
        assert!(output.logits.min().into_scalar() >= 0.0);
    }
}

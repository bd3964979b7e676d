//! # `CNN13`
//!
//! The 13-layer convnet common to semi-supervised benchmarks, without the
//! dropout, gaussian noise and forked heads of the published model.
//!
//! ```text
//! 3 x [conv3x3 f]   -> maxpool 2
//! 3 x [conv3x3 2f]  -> maxpool 2
//! conv3x3 (valid) 4f -> conv1x1 2f -> conv1x1 f
//! global average pool -> dense
//! ```
//!
//! Every conv is ``conv -> leaky_relu(0.2) -> batch_norm``.
//! The topology is only defined for 3 scales (32x32 inputs).

use crate::compat::activation_wrapper::ActivationConfig;
use crate::error::{ArchError, Result};
use crate::hparams::{ClassifierHyperparameters, ClassifierTask};
use crate::layers::blocks::conv_act_norm::{ConvActNorm2d, ConvActNorm2dConfig};
use crate::layers::normalize::{DatasetStatistics, InputNormalization, InputNormalizationConfig};
use crate::layers::padding::PaddingPolicy;
use crate::layers::pool::{MaxPool2dSame, MaxPool2dSameConfig, global_avg_pool};
use crate::models::{ClassifierMeta, ClassifierOutput, InputRequirement};
use bimm_contracts::unpack_shape_contract;
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::{Backend, Tensor};

/// The only supported number of scales.
pub const CNN13_SCALES: usize = 3;

/// Smallest input side that survives both pools and the valid conv.
pub const CNN13_MIN_RESOLUTION: usize = 12;

/// [`Cnn13`] Config.
#[derive(Config, Debug)]
pub struct Cnn13Config {
    /// Number of output classes.
    pub num_classes: usize,

    /// Input statistics.
    pub stats: DatasetStatistics,

    /// Base channel width.
    #[config(default = 32)]
    pub filters: usize,

    /// Leaky-relu negative slope.
    #[config(default = "0.2")]
    pub negative_slope: f64,
}

impl ClassifierMeta for Cnn13Config {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn in_channels(&self) -> usize {
        self.stats.channels()
    }

    fn embedding_dim(&self) -> usize {
        self.filters
    }

    fn input_requirement(&self) -> InputRequirement {
        InputRequirement {
            channels: self.in_channels(),
            min_resolution: [CNN13_MIN_RESOLUTION; 2],
            multiple_of: 1,
        }
    }
}

impl Cnn13Config {
    /// Build a config from the shared hyperparameters.
    ///
    /// Reads `scales` (must be 3) and `filters`.
    pub fn from_hparams(
        task: &ClassifierTask,
        hparams: &ClassifierHyperparameters,
    ) -> Result<Self> {
        hparams.validate()?;
        if hparams.scales != CNN13_SCALES {
            return Err(ArchError::invalid_hyperparameter(
                "scales",
                hparams.scales,
                format!("scales == {CNN13_SCALES}; cnn13 is only specified for 32x32 inputs"),
            ));
        }
        let config = Self::new(task.num_classes, task.stats.clone()).with_filters(hparams.filters);
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
        if self.filters == 0 {
            return Err(ArchError::invalid_hyperparameter(
                "filters",
                self.filters,
                "filters >= 1",
            ));
        }
        self.stats.validate()
    }

    fn conv(
        &self,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        padding: PaddingPolicy,
    ) -> ConvActNorm2dConfig {
        ConvActNorm2dConfig::new(in_channels, out_channels, kernel_size)
            .with_padding(padding)
            .with_act(Some(ActivationConfig::leaky_relu(self.negative_slope)))
            .with_tf_norm()
    }

    /// Initialize a [`Cnn13`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Cnn13<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
        let f = self.filters;
        let same = PaddingPolicy::Same;

        let stage1 = vec![
            self.conv(self.in_channels(), f, 3, same),
            self.conv(f, f, 3, same),
            self.conv(f, f, 3, same),
        ];
        let stage2 = vec![
            self.conv(f, 2 * f, 3, same),
            self.conv(2 * f, 2 * f, 3, same),
            self.conv(2 * f, 2 * f, 3, same),
        ];
        let head = vec![
            self.conv(2 * f, 4 * f, 3, PaddingPolicy::Valid),
            self.conv(4 * f, 2 * f, 1, same),
            self.conv(2 * f, f, 1, same),
        ];
        let pool = MaxPool2dSameConfig::new(2, 2).with_padding(PaddingPolicy::Valid);

        Cnn13 {
            normalize: InputNormalizationConfig::new(self.stats.clone()).init(),
            stage1: stage1.iter().map(|c| c.init(device)).collect(),
            pool1: pool.init(),
            stage2: stage2.iter().map(|c| c.init(device)).collect(),
            pool2: pool.init(),
            head: head.iter().map(|c| c.init(device)).collect(),
            fc: LinearConfig::new(f, self.num_classes)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device),
        }
    }
}

/// `CNN13` classifier.
#[derive(Module, Debug)]
pub struct Cnn13<B: Backend> {
    normalize: InputNormalization,
    stage1: Vec<ConvActNorm2d<B>>,
    pool1: MaxPool2dSame,
    stage2: Vec<ConvActNorm2d<B>>,
    pool2: MaxPool2dSame,
    head: Vec<ConvActNorm2d<B>>,
    fc: Linear<B>,
}

impl<B: Backend> ClassifierMeta for Cnn13<B> {
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
            min_resolution: [CNN13_MIN_RESOLUTION; 2],
            multiple_of: 1,
        }
    }
}

impl<B: Backend> Cnn13<B> {
    /// Forward Pass.
    ///
    /// `CNN13` has no stochastic layers; `training` only selects the
    /// batch-norm mode.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    /// - `training`: use and update batch statistics.
    ///
    /// # Returns
    ///
    /// ``logits: [batch, num_classes]``, ``embedding: [batch, filters]``.
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

        let mut x = self.normalize.forward(input);
        for conv in &self.stage1 {
            x = conv.forward(x, training);
        }
        x = self.pool1.forward(x);
        for conv in &self.stage2 {
            x = conv.forward(x, training);
        }
        x = self.pool2.forward(x);
        for conv in &self.head {
            x = conv.forward(x, training);
        }

        let embedding = global_avg_pool(x);
        let logits = self.fc.forward(embedding.clone());
        assert_eq!(logits.dims(), [batch, self.num_classes()]);

        ClassifierOutput { logits, embedding }
    }
}

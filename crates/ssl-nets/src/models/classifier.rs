//! # Classifier Tagged Union
//!
//! [`ClassifierConfig`] and [`Classifier`] wrap the concrete topologies so a
//! harness can hold "some classifier" without knowing which one.

use crate::error::Result;
use crate::models::cnn13::{Cnn13, Cnn13Config};
use crate::models::resnet::resnet_model::{ResNet, ResNetConfig};
use crate::models::shakenet::shakenet_model::{ShakeNet, ShakeNetConfig};
use crate::models::squeezenet::squeezenet_model::{SqueezeNet, SqueezeNetConfig};
use crate::models::{ClassifierMeta, ClassifierOutput, InputRequirement};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// [`Classifier`] Config.
#[derive(Config, Debug)]
pub enum ClassifierConfig {
    /// [`Cnn13`] Config.
    Cnn13(Cnn13Config),

    /// [`ResNet`] Config.
    ResNet(ResNetConfig),

    /// [`ShakeNet`] Config.
    Shake(ShakeNetConfig),

    /// [`SqueezeNet`] Config.
    SqueezeNet(SqueezeNetConfig),
}

impl From<Cnn13Config> for ClassifierConfig {
    fn from(config: Cnn13Config) -> Self {
        Self::Cnn13(config)
    }
}

impl From<ResNetConfig> for ClassifierConfig {
    fn from(config: ResNetConfig) -> Self {
        Self::ResNet(config)
    }
}

impl From<ShakeNetConfig> for ClassifierConfig {
    fn from(config: ShakeNetConfig) -> Self {
        Self::Shake(config)
    }
}

impl From<SqueezeNetConfig> for ClassifierConfig {
    fn from(config: SqueezeNetConfig) -> Self {
        Self::SqueezeNet(config)
    }
}

impl ClassifierMeta for ClassifierConfig {
    fn num_classes(&self) -> usize {
        match self {
            Self::Cnn13(config) => config.num_classes(),
            Self::ResNet(config) => config.num_classes(),
            Self::Shake(config) => config.num_classes(),
            Self::SqueezeNet(config) => config.num_classes(),
        }
    }

    fn in_channels(&self) -> usize {
        match self {
            Self::Cnn13(config) => config.in_channels(),
            Self::ResNet(config) => config.in_channels(),
            Self::Shake(config) => config.in_channels(),
            Self::SqueezeNet(config) => config.in_channels(),
        }
    }

    fn embedding_dim(&self) -> usize {
        match self {
            Self::Cnn13(config) => config.embedding_dim(),
            Self::ResNet(config) => config.embedding_dim(),
            Self::Shake(config) => config.embedding_dim(),
            Self::SqueezeNet(config) => config.embedding_dim(),
        }
    }

    fn input_requirement(&self) -> InputRequirement {
        match self {
            Self::Cnn13(config) => config.input_requirement(),
            Self::ResNet(config) => config.input_requirement(),
            Self::Shake(config) => config.input_requirement(),
            Self::SqueezeNet(config) => config.input_requirement(),
        }
    }
}

impl ClassifierConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<()> {
        match self {
            Self::Cnn13(config) => config.try_validate(),
            Self::ResNet(config) => config.try_validate(),
            Self::Shake(config) => config.try_validate(),
            Self::SqueezeNet(config) => config.try_validate(),
        }
    }

    /// Initialize a [`Classifier`].
    ///
    /// # Panics
    ///
    /// If the config is invalid; see [`ClassifierConfig::try_init`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Classifier<B> {
        match self {
            Self::Cnn13(config) => Classifier::Cnn13(config.init(device)),
            Self::ResNet(config) => Classifier::ResNet(config.init(device)),
            Self::Shake(config) => Classifier::Shake(config.init(device)),
            Self::SqueezeNet(config) => Classifier::SqueezeNet(config.init(device)),
        }
    }

    /// Validate, then initialize a [`Classifier`].
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<Classifier<B>> {
        self.try_validate()?;
        Ok(self.init(device))
    }
}

/// A classifier of any registered topology.
#[derive(Module, Debug)]
pub enum Classifier<B: Backend> {
    /// `CNN13`.
    Cnn13(Cnn13<B>),

    /// Wide pre-activation `ResNet`.
    ResNet(ResNet<B>),

    /// Shake-Shake `ResNet`.
    Shake(ShakeNet<B>),

    /// `SqueezeNet` family.
    SqueezeNet(SqueezeNet<B>),
}

impl<B: Backend> ClassifierMeta for Classifier<B> {
    fn num_classes(&self) -> usize {
        match self {
            Self::Cnn13(model) => model.num_classes(),
            Self::ResNet(model) => model.num_classes(),
            Self::Shake(model) => model.num_classes(),
            Self::SqueezeNet(model) => model.num_classes(),
        }
    }

    fn in_channels(&self) -> usize {
        match self {
            Self::Cnn13(model) => model.in_channels(),
            Self::ResNet(model) => model.in_channels(),
            Self::Shake(model) => model.in_channels(),
            Self::SqueezeNet(model) => model.in_channels(),
        }
    }

    fn embedding_dim(&self) -> usize {
        match self {
            Self::Cnn13(model) => model.embedding_dim(),
            Self::ResNet(model) => model.embedding_dim(),
            Self::Shake(model) => model.embedding_dim(),
            Self::SqueezeNet(model) => model.embedding_dim(),
        }
    }

    fn input_requirement(&self) -> InputRequirement {
        match self {
            Self::Cnn13(model) => model.input_requirement(),
            Self::ResNet(model) => model.input_requirement(),
            Self::Shake(model) => model.input_requirement(),
            Self::SqueezeNet(model) => model.input_requirement(),
        }
    }
}

impl<B: Backend> Classifier<B> {
    /// Check an input against [`ClassifierMeta::input_requirement`].
    ///
    /// `architecture` names the classifier in the error.
    pub fn check_input(
        &self,
        architecture: &str,
        input: &Tensor<B, 4>,
    ) -> Result<()> {
        self.input_requirement().check(architecture, input.dims())
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    /// - `training`: enables the stochastic layers; selects batch-norm mode.
    ///
    /// # Returns
    ///
    /// ``logits: [batch, num_classes]``, ``embedding: [batch, embedding_dim]``.
    ///
    /// # Panics
    ///
    /// If the input violates the shape contract; see [`Classifier::check_input`].
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        training: bool,
    ) -> ClassifierOutput<B> {
        match self {
            Self::Cnn13(model) => model.forward(input, training),
            Self::ResNet(model) => model.forward(input, training),
            Self::Shake(model) => model.forward(input, training),
            Self::SqueezeNet(model) => model.forward(input, training),
        }
    }
}

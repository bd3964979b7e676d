//! # Activation Layer Wrapper
//!
//! The backbones only use rectifiers:
//! * [`Relu`] - `SqueezeNet`, Shake-Shake.
//! * [`LeakyRelu`] - `CNN13` (slope ``0.2``), `ResNet` (slope ``0.1``).
use burn::nn::{LeakyRelu, LeakyReluConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu`] activation layer.
    Relu,

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyReluConfig),
}

impl From<LeakyReluConfig> for ActivationConfig {
    fn from(config: LeakyReluConfig) -> Self {
        Self::LeakyRelu(config)
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl ActivationConfig {
    /// A [`LeakyRelu`] config with the given negative slope.
    pub fn leaky_relu(negative_slope: f64) -> Self {
        LeakyReluConfig::new()
            .with_negative_slope(negative_slope)
            .into()
    }

    /// Initialize a wrapped activation layer.
    pub fn init(&self) -> Activation {
        match self {
            ActivationConfig::Relu => Activation::Relu(Relu),
            ActivationConfig::LeakyRelu(conf) => Activation::LeakyRelu(conf.init()),
        }
    }
}

/// Activation Layer Wrapper.
#[derive(Module, Clone, Debug)]
#[non_exhaustive]
pub enum Activation {
    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyRelu),
}

impl Activation {
    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Relu(layer) => layer.forward(input),
            Activation::LeakyRelu(layer) => layer.forward(input),
        }
    }
}

//! # Flag-Driven Dropout
//!
//! ``burn::nn::Dropout`` is active whenever the backend tracks gradients;
//! the backbones instead take the train/eval decision from the caller,
//! so the same module can run a deterministic pass on an autodiff backend.

use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;

/// Check that a probability is in ``[0, 1)``.
///
/// # Panics
///
/// If the value is out of range.
pub fn expect_drop_probability(prob: f64) -> f64 {
    assert!(
        (0.0..1.0).contains(&prob),
        "drop probability {prob} not in [0, 1)"
    );
    prob
}

/// [`FlagDropout`] Config.
#[derive(Config, Debug)]
pub struct FlagDropoutConfig {
    /// Probability of zeroing an element.
    pub prob: f64,
}

impl FlagDropoutConfig {
    /// Initialize a [`FlagDropout`].
    pub fn init(&self) -> FlagDropout {
        FlagDropout {
            prob: expect_drop_probability(self.prob),
        }
    }
}

/// Inverted dropout, enabled by an explicit flag.
#[derive(Module, Clone, Debug)]
pub struct FlagDropout {
    /// Probability of zeroing an element.
    pub prob: f64,
}

impl FlagDropout {
    /// Forward Pass.
    ///
    /// When `training` is set, each element is zeroed with probability
    /// `prob` and survivors are scaled by ``1 / (1 - prob)``;
    /// otherwise the input is returned unchanged.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
        training: bool,
    ) -> Tensor<B, D> {
        if !training || self.prob == 0.0 {
            return input;
        }
        let keep = 1.0 - self.prob;
        let mask = Tensor::<B, D>::random(
            input.shape(),
            Distribution::Bernoulli(keep),
            &input.device(),
        );
        input * mask / keep
    }
}

#![warn(missing_docs)]
//!# ssl-nets - Interchangeable Classifier Backbones
//!
//! A registry of CNN classifiers for semi-supervised image classification,
//! selected by name and driven by one shared hyperparameter bundle.
//!
//! ## Notable Components
//!
//! * [`registry`] - the named topology table.
//! * [`dispatch`] - name + batch + hyperparameters -> ``{logits, embedding}``.
//! * [`store`] - scoped parameter ownership, reuse, and shadow getters.
//! * [`smoothing`] - label smoothing augmentation.
//! * [`compat`] - compat wrappers over ``burn::nn``.
//!   * [`compat::activation_wrapper::Activation`] - activation layer abstraction wrapper.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::blocks::conv_act_norm`] - ``Conv2d + Activation + BatchNorm2d`` block.
//!   * [`layers::drop::dropout`] - flag-driven dropout.
//!   * [`layers::norm::batch_norm`] - flag-driven batch norm.
//!   * [`layers::normalize`] - per-channel input standardization.
//!   * [`layers::pool`] - TF-style pooling.
//!   * [`layers::shake`] - shake-shake branch mixing.
//! * [`models`] - complete model families.
//!   * [`models::cnn13`] - `CNN13`
//!   * [`models::resnet`] - pre-activation `ResNet`
//!   * [`models::shakenet`] - Shake-Shake `ResNet`
//!   * [`models::squeezenet`] - The `SqueezeNet` Family.
//! * [`utility`] - record inspection.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;

#[cfg(test)]
#[allow(dead_code)]
pub(crate) mod testing;

pub mod error;
pub mod hparams;
pub mod layers;

pub mod dispatch;
pub mod models;
pub mod registry;
pub mod smoothing;
pub mod store;
pub mod utility;

pub use dispatch::{ClassifierDispatcher, nhwc_to_nchw};
pub use error::{ArchError, Result};
pub use hparams::{ClassifierHyperparameters, ClassifierTask};
pub use layers::normalize::DatasetStatistics;
pub use models::{ClassifierMeta, ClassifierOutput};
pub use registry::{Architecture, architecture_names, lookup_architecture};
pub use store::{LiveParameters, ParameterGetter, ParameterStore, Reuse, ShadowParameters};

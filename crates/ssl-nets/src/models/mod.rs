//! # Classifier Topologies
//!
//! Every topology:
//! * standardizes its input with the task's [`DatasetStatistics`],
//! * runs a fixed (data-independent) sequence of layers,
//! * ends with global average pooling and a projection to class logits.
//!
//! [`ClassifierMeta`] is the common meta API of the topology configs and
//! modules; [`classifier::ClassifierConfig`] / [`classifier::Classifier`]
//! are the tagged unions the dispatcher works with.
//!
//! [`DatasetStatistics`]: crate::layers::normalize::DatasetStatistics

pub mod classifier;
pub mod cnn13;
pub mod resnet;
pub mod shakenet;
pub mod squeezenet;
pub mod util;

use crate::error::{ArchError, Result};
use burn::prelude::{Backend, Tensor};

/// The typed output of a classifier forward pass.
#[derive(Debug, Clone)]
pub struct ClassifierOutput<B: Backend> {
    /// ``[batch, num_classes]`` unnormalized class scores.
    pub logits: Tensor<B, 2>,

    /// ``[batch, embedding_dim]`` penultimate features.
    pub embedding: Tensor<B, 2>,
}

/// Input shape accepted by a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRequirement {
    /// Required channel count.
    pub channels: usize,

    /// Smallest accepted ``[height, width]``.
    pub min_resolution: [usize; 2],

    /// Height and width must be multiples of this.
    pub multiple_of: usize,
}

impl InputRequirement {
    /// Human-readable description, used in [`ArchError::ShapeMismatch`].
    pub fn describe(&self) -> String {
        let [min_h, min_w] = self.min_resolution;
        let mut desc = format!(
            "[batch>=1, channels={}, height>={min_h}, width>={min_w}]",
            self.channels
        );
        if self.multiple_of > 1 {
            desc.push_str(&format!(
                " with height and width multiples of {}",
                self.multiple_of
            ));
        }
        desc
    }

    /// Check that a ``[batch, channels, height, width]`` shape is accepted.
    pub fn check(
        &self,
        architecture: &str,
        dims: [usize; 4],
    ) -> Result<()> {
        let [batch, channels, height, width] = dims;
        let [min_h, min_w] = self.min_resolution;
        let multiple = self.multiple_of.max(1);

        let ok = batch >= 1
            && channels == self.channels
            && height >= min_h
            && width >= min_w
            && height % multiple == 0
            && width % multiple == 0;

        if ok {
            Ok(())
        } else {
            Err(ArchError::ShapeMismatch {
                architecture: architecture.to_string(),
                expected: self.describe(),
                actual: dims.to_vec(),
            })
        }
    }
}

/// Common meta API of classifier configs and modules.
pub trait ClassifierMeta {
    /// Number of output classes.
    fn num_classes(&self) -> usize;

    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Width of the embedding.
    fn embedding_dim(&self) -> usize;

    /// Accepted input shapes.
    fn input_requirement(&self) -> InputRequirement;
}

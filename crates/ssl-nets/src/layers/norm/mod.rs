//! Normalization layers.

pub mod batch_norm;

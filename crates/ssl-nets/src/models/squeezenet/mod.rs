//! # `SqueezeNet`

pub mod fire;
pub mod squeezenet_model;

//! # Wide Pre-Activation `ResNet`

pub mod residual_block;
pub mod resnet_model;

//! # Shake-Shake `ResNet`

pub mod shake_block;
pub mod shakenet_model;

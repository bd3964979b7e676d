//! Reusable convolution blocks.

pub mod conv_act_norm;

//! Compat wrappers over ``burn::nn`` layers.

pub mod activation_wrapper;

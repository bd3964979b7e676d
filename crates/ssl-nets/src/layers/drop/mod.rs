//! Dropout layers.

pub mod dropout;

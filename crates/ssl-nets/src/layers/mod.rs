//! Common low-level modules shared by the backbones.
pub mod blocks;
pub mod drop;
pub mod norm;
pub mod normalize;
pub mod padding;
pub mod pool;
pub mod shake;

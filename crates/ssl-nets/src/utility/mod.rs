//! # Utilities

pub mod record;

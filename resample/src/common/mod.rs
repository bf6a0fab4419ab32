//! Common utils used across the crate

pub mod utils;

//! Utils

pub mod memory;

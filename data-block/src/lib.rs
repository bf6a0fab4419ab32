//! # DataBlock
//!
//! `DataBlock` is the minimal columnar format used by the `resample` aggregation
//! functions. It is inspired by [`Arrow`] and the [`Type Exercise in Rust`]:
//!
//! - it only provides the functions that aggregation functions and output formats need
//!
//! - arrays are built by appending, the validity bitmap is only materialized when the
//! first `NULL` is appended
//!
//! [`Arrow`]: https://github.com/apache/arrow-rs
//! [`Type Exercise in Rust`]: https://github.com/skyzh/type-exercise-in-rust

pub mod array;
pub mod bitmap;
pub mod block;
pub mod element;
mod macros;
pub mod types;

mod private {
    /// Sealed trait protect against downstream implementations
    pub trait Sealed {}
}

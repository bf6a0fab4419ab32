#![warn(clippy::todo)]
#![deny(
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    rustdoc::private_intra_doc_links,
    rust_2018_idioms,
    missing_docs,
    clippy::needless_borrow,
    clippy::redundant_clone,
    missing_debug_implementations
)]

//! # Resample
//!
//! Aggregate functions over the columnar [`data_block`] format. The heart of the crate is
//! the [`Resample`] combinator: it turns any aggregate function into a bucketed variant
//! that computes one independent aggregate per key-range bucket in a single pass,
//! without a grouping stage.
//!
//! [`Resample`]: crate::function::aggregate::combinator::resample::Resample

pub mod common;
pub mod error;
pub mod formats;
pub mod function;
pub mod io;

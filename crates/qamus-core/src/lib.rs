//! Core types and trait definitions for the Qamus lexicon.
//!
//! This crate is free of database and runtime dependencies. The store backend
//! and the enrichment pipeline both depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod analysis;
pub mod arabic;
pub mod candidate;
pub mod entry;
pub mod error;
pub mod store;

pub use error::{Error, Result};

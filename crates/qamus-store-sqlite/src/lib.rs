//! SQLite backend for the Qamus lexicon.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Owns the `entries` table, its
//! `entries_fts` search projection and the triggers that keep them in sync.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

//! Error type for `qamus-store-sqlite`.

use std::path::PathBuf;

use qamus_core::store::StoreError;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] qamus_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// The store file does not exist; stores are only created explicitly.
  #[error("store file not found: {}", .0.display())]
  StoreMissing(PathBuf),
}

impl Error {
  /// SQLITE_BUSY or SQLITE_LOCKED: another connection holds the lock.
  pub fn is_busy(&self) -> bool {
    match self {
      Error::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(err, _),
      )) => matches!(
        err.code,
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
      ),
      _ => false,
    }
  }
}

impl StoreError for Error {
  fn is_busy(&self) -> bool { Error::is_busy(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

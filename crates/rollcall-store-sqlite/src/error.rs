//! Error type for `rollcall-store-sqlite`.

use rollcall_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rollcall_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("badge {0} is already assigned to another member")]
  BadgeTaken(String),
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Self::BadgeTaken(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

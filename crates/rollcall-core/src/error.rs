//! Error types for `rollcall-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown scan direction: {0:?}")]
  UnknownDirection(String),

  #[error("unknown broadcast priority: {0:?}")]
  UnknownPriority(String),

  #[error("invalid utc offset: {0} minutes")]
  InvalidOffset(i32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

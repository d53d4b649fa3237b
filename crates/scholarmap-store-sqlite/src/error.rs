//! Error type for `scholarmap-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column holds a value no variant matches.
  #[error("invalid {column} value: {value:?}")]
  InvalidEnum { column: &'static str, value: String },

  /// An update targeted a program id that does not exist.
  #[error("program not found: {0}")]
  ProgramNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

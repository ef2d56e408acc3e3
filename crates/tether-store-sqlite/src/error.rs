//! Error type for `tether-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column held a value this build does not know.
  #[error("unknown {column} value: {value:?}")]
  UnknownVariant { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Error type for `tether-tracker`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The device refused access to its location. Tracking state is left
  /// unchanged.
  #[error("location permission denied: {0}")]
  PermissionDenied(String),

  /// The server rejected our identity. Fatal to the ping loop.
  #[error("unauthenticated")]
  Unauthenticated,

  /// The server answered with a non-success status other than 401.
  #[error("server rejected ping ({status}): {code}")]
  Rejected { status: u16, code: String },

  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  /// No usable fix could be obtained.
  #[error("location unavailable: {0}")]
  Location(String),
}

impl Error {
  /// Whether this error must stop the ping loop rather than be retried on
  /// the next tick.
  pub fn is_fatal(&self) -> bool { matches!(self, Self::Unauthenticated) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

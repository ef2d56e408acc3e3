//! Error types for `tether-core`.
//!
//! The variants mirror the taxonomy every caller sees: the API layer maps
//! them one-to-one onto HTTP statuses, and the tracker treats only
//! [`Error::Unauthenticated`] as fatal.

use std::fmt;

use thiserror::Error;

/// Why a trust request target was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTarget {
  /// The requester named themselves.
  SelfTarget,
  /// No profile exists for the target id.
  UnknownUser,
}

impl fmt::Display for InvalidTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::SelfTarget => f.write_str("cannot target self"),
      Self::UnknownUser => f.write_str("user not found"),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// Missing or invalid bearer identity.
  #[error("unauthenticated")]
  Unauthenticated,

  /// The caller is identified but not allowed; the payload is a stable
  /// machine-readable code such as `not_trusted` or `share_blocked`.
  #[error("forbidden: {0}")]
  Forbidden(&'static str),

  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("invalid target: {0}")]
  InvalidTarget(InvalidTarget),

  /// The payload names the kind of thing that was missing.
  #[error("{0} not found")]
  NotFound(&'static str),

  #[error("rate limited; retry in {wait_ms} ms")]
  RateLimited { wait_ms: u64 },

  /// A backing store call failed. Surfaced to callers as an opaque 500.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error into [`Error::Store`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidArgument(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! The identity capability consumed from the outside world.
//!
//! Issuing tokens and managing accounts belong to the identity provider; this
//! crate only needs "bearer token → user id".

use crate::{Result, UserId};

pub trait TokenVerifier: Send + Sync + 'static {
  /// Resolve a bearer token (without the `Bearer ` prefix) to its user.
  ///
  /// Returns [`crate::Error::Unauthenticated`] for anything that does not
  /// verify.
  fn verify(&self, bearer_token: &str) -> Result<UserId>;
}

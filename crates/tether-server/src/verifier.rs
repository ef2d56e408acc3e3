//! Argon2-backed bearer token verification.
//!
//! A token has the form `<user_id>.<secret>`. The secret is checked against
//! the argon2 PHC hash configured for that user, so the server never stores
//! a usable token.

use std::collections::HashMap;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand_core::OsRng;
use tether_core::{Error as CoreError, UserId, identity::TokenVerifier};
use tracing::debug;

use crate::{Error, Result, settings::UserEntry};

pub struct Argon2TokenVerifier {
  hashes: HashMap<UserId, String>,
}

impl Argon2TokenVerifier {
  /// Build from configured users, rejecting malformed hashes and duplicate
  /// ids up front.
  pub fn new(users: &[UserEntry]) -> Result<Self> {
    let mut hashes = HashMap::with_capacity(users.len());
    for user in users {
      PasswordHash::new(&user.token_hash)
        .map_err(|_| Error::InvalidTokenHash(user.user_id))?;
      if hashes.insert(user.user_id, user.token_hash.clone()).is_some() {
        return Err(Error::DuplicateUser(user.user_id));
      }
    }
    Ok(Self { hashes })
  }
}

impl TokenVerifier for Argon2TokenVerifier {
  fn verify(&self, bearer_token: &str) -> tether_core::Result<UserId> {
    let (id, secret) = bearer_token
      .split_once('.')
      .ok_or(CoreError::Unauthenticated)?;
    let user_id = UserId::parse_str(id).map_err(|_| CoreError::Unauthenticated)?;
    let hash = self.hashes.get(&user_id).ok_or(CoreError::Unauthenticated)?;
    let parsed = PasswordHash::new(hash).map_err(|_| CoreError::Unauthenticated)?;

    Argon2::default()
      .verify_password(secret.as_bytes(), &parsed)
      .map_err(|_| {
        debug!(%user_id, "token secret rejected");
        CoreError::Unauthenticated
      })?;
    Ok(user_id)
  }
}

/// Hash a token secret into an argon2 PHC string for the `users` config.
pub fn hash_secret(secret: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(secret.as_bytes(), &salt)
      .map_err(|e| Error::Hash(e.to_string()))?
      .to_string(),
  )
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  fn entry(user_id: UserId, secret: &str) -> UserEntry {
    UserEntry {
      user_id,
      email: "alice@example.com".into(),
      display_name: None,
      token_hash: hash_secret(secret).unwrap(),
    }
  }

  #[test]
  fn correct_token_verifies() {
    let id = Uuid::new_v4();
    let v = Argon2TokenVerifier::new(&[entry(id, "s3cret")]).unwrap();
    assert_eq!(v.verify(&format!("{id}.s3cret")).unwrap(), id);
  }

  #[test]
  fn wrong_or_malformed_tokens_are_unauthenticated() {
    let id = Uuid::new_v4();
    let v = Argon2TokenVerifier::new(&[entry(id, "s3cret")]).unwrap();
    for token in [
      format!("{id}.wrong"),
      format!("{}.s3cret", Uuid::new_v4()),
      "s3cret".to_owned(),
      "not-a-uuid.s3cret".to_owned(),
    ] {
      assert!(
        matches!(v.verify(&token), Err(CoreError::Unauthenticated)),
        "{token}"
      );
    }
  }

  #[test]
  fn bad_config_is_rejected() {
    let id = Uuid::new_v4();
    let mut bad = entry(id, "x");
    bad.token_hash = "plaintext".into();
    assert!(matches!(
      Argon2TokenVerifier::new(&[bad]),
      Err(Error::InvalidTokenHash(_))
    ));
    assert!(matches!(
      Argon2TokenVerifier::new(&[entry(id, "a"), entry(id, "b")]),
      Err(Error::DuplicateUser(_))
    ));
  }
}

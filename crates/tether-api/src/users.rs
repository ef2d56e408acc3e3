//! `POST /users/lookup`, body: `{"email": "..."}`
//!
//! Resolves an email to a user so the caller can send a trust request.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tether_core::{Error, share::ShareRegistry, store::TetherStore};

use crate::{AppState, auth::AuthUser, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct LookupBody {
  #[serde(default)]
  pub email: String,
}

/// Emails are matched trimmed and lowercased.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

pub async fn lookup<S, R>(
  State(state): State<AppState<S, R>>,
  AuthUser(user_id): AuthUser,
  body: Result<Json<LookupBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let Json(body) = body?;
  let email = normalize_email(&body.email);
  if email.is_empty() {
    return Err(ApiError::bad_request("email is required"));
  }

  let Some(profile) = state
    .store
    .find_profile_by_email(email)
    .await
    .map_err(Error::store)?
  else {
    return Ok(Json(json!({ "exists": false })));
  };

  let mut reply = json!({
    "exists": true,
    "userId": profile.user_id,
    "email": profile.email,
    "displayName": profile.display_name,
  });
  if profile.user_id == user_id {
    reply["isSelf"] = json!(true);
  }
  Ok(Json(reply))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn emails_are_trimmed_and_lowercased() {
    assert_eq!(normalize_email("  Alice@Example.COM \n"), "alice@example.com");
    assert_eq!(normalize_email("   "), "");
  }
}

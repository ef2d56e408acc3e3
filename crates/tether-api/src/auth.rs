//! Caller identity extractors.
//!
//! A bearer token is resolved through the configured [`TokenVerifier`]. When
//! the server runs with `require_auth = false` (never in production), a
//! request without a bearer may instead name its user in `x-dev-userid`.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use tether_core::{Error, UserId, identity::TokenVerifier};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Header naming the caller when the dev auth bypass is enabled.
pub const DEV_USER_HEADER: &str = "x-dev-userid";

/// An authenticated caller. Rejects with 401 if no identity is presented.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

/// A caller that may be anonymous; used by the ping endpoints, where an
/// anonymous caller takes the guest path.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<UserId>);

/// Resolve the caller from `headers`.
///
/// `Ok(None)` means no credentials were presented at all; credentials that
/// are present but do not verify are always `Unauthenticated`.
pub fn identify(
  headers: &HeaderMap,
  verifier: &dyn TokenVerifier,
  require_auth: bool,
) -> Result<Option<UserId>, Error> {
  if let Some(value) = headers.get(header::AUTHORIZATION) {
    let value = value.to_str().map_err(|_| Error::Unauthenticated)?;
    let token = value
      .strip_prefix("Bearer ")
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or(Error::Unauthenticated)?;
    return verifier.verify(token).map(Some);
  }

  if !require_auth && let Some(value) = headers.get(DEV_USER_HEADER) {
    let id = value
      .to_str()
      .ok()
      .and_then(|s| Uuid::parse_str(s.trim()).ok())
      .ok_or(Error::Unauthenticated)?;
    return Ok(Some(id));
  }

  Ok(None)
}

impl<S, R> FromRequestParts<AppState<S, R>> for MaybeAuthUser
where
  S: Send + Sync + 'static,
  R: Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, R>,
  ) -> Result<Self, Self::Rejection> {
    let user = identify(&parts.headers, state.verifier.as_ref(), state.require_auth)?;
    Ok(MaybeAuthUser(user))
  }
}

impl<S, R> FromRequestParts<AppState<S, R>> for AuthUser
where
  S: Send + Sync + 'static,
  R: Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, R>,
  ) -> Result<Self, Self::Rejection> {
    identify(&parts.headers, state.verifier.as_ref(), state.require_auth)?
      .map(AuthUser)
      .ok_or(ApiError::Core(Error::Unauthenticated))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  struct OneToken(UserId);

  impl TokenVerifier for OneToken {
    fn verify(&self, bearer_token: &str) -> tether_core::Result<UserId> {
      if bearer_token == "good" { Ok(self.0) } else { Err(Error::Unauthenticated) }
    }
  }

  fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (k, v) in pairs {
      map.insert(
        header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
        HeaderValue::from_str(v).unwrap(),
      );
    }
    map
  }

  #[test]
  fn bearer_resolves_through_verifier() {
    let id = Uuid::new_v4();
    let v = OneToken(id);
    let h = headers(&[("authorization", "Bearer good")]);
    assert_eq!(identify(&h, &v, true).unwrap(), Some(id));

    let bad = headers(&[("authorization", "Bearer nope")]);
    assert!(matches!(identify(&bad, &v, true), Err(Error::Unauthenticated)));

    let empty = headers(&[("authorization", "Bearer   ")]);
    assert!(matches!(identify(&empty, &v, true), Err(Error::Unauthenticated)));

    let basic = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
    assert!(matches!(identify(&basic, &v, true), Err(Error::Unauthenticated)));
  }

  #[test]
  fn dev_header_only_honoured_without_require_auth() {
    let id = Uuid::new_v4();
    let v = OneToken(Uuid::new_v4());
    let h = headers(&[(DEV_USER_HEADER, &id.to_string())]);

    assert_eq!(identify(&h, &v, false).unwrap(), Some(id));
    assert_eq!(identify(&h, &v, true).unwrap(), None);

    let junk = headers(&[(DEV_USER_HEADER, "not-a-uuid")]);
    assert!(matches!(identify(&junk, &v, false), Err(Error::Unauthenticated)));
  }

  #[test]
  fn no_credentials_is_anonymous() {
    let v = OneToken(Uuid::new_v4());
    assert_eq!(identify(&HeaderMap::new(), &v, true).unwrap(), None);
  }
}

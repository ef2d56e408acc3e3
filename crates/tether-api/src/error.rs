//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as `{"error": <code>}`; rate limiting adds
//! `waitMs`. Store failures are logged with their cause and reported to the
//! caller only as `internal_error`.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use tether_core::InvalidTarget;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] tether_core::Error),

  /// The body was not JSON or did not match the expected shape.
  #[error("malformed body: {0}")]
  Body(#[from] JsonRejection),
}

impl ApiError {
  pub fn bad_request(msg: impl Into<String>) -> Self {
    Self::Core(tether_core::Error::invalid(msg))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    use tether_core::Error as E;

    let core = match self {
      ApiError::Body(rejection) => {
        let body = json!({ "error": "invalid_body", "detail": rejection.body_text() });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
      }
      ApiError::Core(e) => e,
    };

    let (status, code) = match core {
      E::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated".to_owned()),
      E::Forbidden(code) => (StatusCode::FORBIDDEN, code.to_owned()),
      E::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg),
      E::InvalidTarget(InvalidTarget::SelfTarget) => {
        (StatusCode::BAD_REQUEST, "cannot_target_self".to_owned())
      }
      E::InvalidTarget(InvalidTarget::UnknownUser) => {
        (StatusCode::NOT_FOUND, "user_not_found".to_owned())
      }
      E::NotFound(_) => (StatusCode::NOT_FOUND, "not_found".to_owned()),
      E::RateLimited { wait_ms } => {
        let body = json!({ "error": "rate_limited", "waitMs": wait_ms });
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
      }
      E::Store(source) => {
        error!(error = %source, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal_error".to_owned())
      }
    };
    (status, Json(json!({ "error": code }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn status_of(e: tether_core::Error) -> StatusCode {
    ApiError::from(e).into_response().status()
  }

  #[test]
  fn taxonomy_maps_to_statuses() {
    use tether_core::Error as E;
    assert_eq!(status_of(E::Unauthenticated), StatusCode::UNAUTHORIZED);
    assert_eq!(status_of(E::Forbidden("not_trusted")), StatusCode::FORBIDDEN);
    assert_eq!(status_of(E::invalid("bad")), StatusCode::BAD_REQUEST);
    assert_eq!(
      status_of(E::InvalidTarget(InvalidTarget::SelfTarget)),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      status_of(E::InvalidTarget(InvalidTarget::UnknownUser)),
      StatusCode::NOT_FOUND
    );
    assert_eq!(status_of(E::NotFound("share")), StatusCode::NOT_FOUND);
    assert_eq!(
      status_of(E::RateLimited { wait_ms: 10 }),
      StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
      status_of(E::store(std::io::Error::other("disk on fire"))),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}

//! `POST /visibility/set`, body: `{"viewerUserId": "<uuid>", "canView": true}`
//!
//! `canView` must be a JSON boolean; the body is taken as raw JSON so that
//! `"true"` or `1` are rejected instead of coerced.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};
use tether_core::{share::ShareRegistry, store::TetherStore, visibility::parse_can_view};
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

pub async fn set<S, R>(
  State(state): State<AppState<S, R>>,
  AuthUser(user_id): AuthUser,
  body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let Json(body) = body?;

  let viewer_id = match body.get("viewerUserId") {
    None | Some(Value::Null) => {
      return Err(ApiError::bad_request("viewerUserId is required"));
    }
    Some(Value::String(s)) => Uuid::parse_str(s)
      .map_err(|_| ApiError::bad_request("viewerUserId must be a user id"))?,
    Some(_) => return Err(ApiError::bad_request("viewerUserId must be a user id")),
  };
  let can_view = parse_can_view(body.get("canView"))?;

  let grant = state.acl().set_grant(user_id, viewer_id, can_view).await?;
  Ok(Json(json!({ "ok": true, "visibility": grant })))
}

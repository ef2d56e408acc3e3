//! `GET /live/visible`: the owners the caller can see right now.

use axum::{Json, extract::State};
use serde_json::{Value, json};
use tether_core::{share::ShareRegistry, store::TetherStore};

use crate::{AppState, auth::AuthUser, error::ApiError};

pub async fn visible<S, R>(
  State(state): State<AppState<S, R>>,
  AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let users = state.live().visible_for(user_id).await?;
  Ok(Json(json!({ "users": users })))
}

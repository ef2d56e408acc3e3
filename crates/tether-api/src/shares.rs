//! Guest share lifecycle.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/shares/start` | `{"token": "...", "reason": "..."}` |
//! | `POST` | `/shares/end` | `{"token": "..."}` |
//! | `POST` | `/shares/{token}/block` |   |
//!
//! These routes are unauthenticated: possession of the token is the
//! capability.

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tether_core::{share::ShareRegistry, store::TetherStore};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ShareBody {
  #[serde(default)]
  pub token:  String,
  pub reason: Option<String>,
}

/// `POST /shares/start`
pub async fn start<S, R>(
  State(state): State<AppState<S, R>>,
  body: Result<Json<ShareBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let Json(body) = body?;
  let share = state.gate.start_share(&body.token, body.reason).await?;
  Ok(Json(json!({ "ok": true, "share": share })))
}

/// `POST /shares/end`
pub async fn end<S, R>(
  State(state): State<AppState<S, R>>,
  body: Result<Json<ShareBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let Json(body) = body?;
  let share = state.gate.end_share(&body.token).await?;
  Ok(Json(json!({ "ok": true, "share": share })))
}

/// `POST /shares/{token}/block`
pub async fn block<S, R>(
  State(state): State<AppState<S, R>>,
  Path(token): Path<String>,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let share = state.gate.block(&token).await?;
  Ok(Json(json!({ "ok": true, "share": share })))
}

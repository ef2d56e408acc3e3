//! Handlers for `/trust` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/trust/request` | Body: `{"targetUserId": "<uuid>"}` |
//! | `GET`  | `/trust/requests/incoming` | Pending requests addressed to the caller |
//! | `POST` | `/trust/requests/{id}/accept` | Addressee only |
//! | `POST` | `/trust/requests/{id}/deny` | Addressee only |
//! | `GET`  | `/trust/list` | Accepted contacts with `shareEnabled` |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tether_core::{share::ShareRegistry, store::TetherStore, trust::RequestOutcome};
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

// ─── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
  pub target_user_id: Option<Uuid>,
}

/// `POST /trust/request`
pub async fn request<S, R>(
  State(state): State<AppState<S, R>>,
  AuthUser(user_id): AuthUser,
  body: Result<Json<RequestBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let Json(body) = body?;
  let target = body
    .target_user_id
    .ok_or_else(|| ApiError::bad_request("targetUserId is required"))?;

  let reply = match state.trust().request(user_id, target).await? {
    RequestOutcome::Pending(edge) | RequestOutcome::AlreadyTrusted(edge) => {
      json!({ "ok": true, "request": edge })
    }
    RequestOutcome::AutoAccepted { accepted, .. } => {
      json!({ "ok": true, "autoAccepted": true, "accepted": accepted })
    }
  };
  Ok(Json(reply))
}

// ─── Incoming ────────────────────────────────────────────────────────────────

/// `GET /trust/requests/incoming`
pub async fn incoming<S, R>(
  State(state): State<AppState<S, R>>,
  AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let requests = state.trust().list_incoming(user_id).await?;
  Ok(Json(json!({ "requests": requests })))
}

// ─── Accept / deny ───────────────────────────────────────────────────────────

/// `POST /trust/requests/{id}/accept`
pub async fn accept<S, R>(
  State(state): State<AppState<S, R>>,
  AuthUser(user_id): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let accepted = state.trust().accept(id, user_id).await?;
  Ok(Json(json!({ "ok": true, "accepted": accepted })))
}

/// `POST /trust/requests/{id}/deny`
pub async fn deny<S, R>(
  State(state): State<AppState<S, R>>,
  AuthUser(user_id): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  state.trust().deny(id, user_id).await?;
  Ok(Json(json!({ "ok": true })))
}

// ─── Contact list ────────────────────────────────────────────────────────────

/// `GET /trust/list`
pub async fn list<S, R>(
  State(state): State<AppState<S, R>>,
  AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let contacts = state.trust().list_accepted(user_id).await?;
  Ok(Json(json!({ "contacts": contacts })))
}

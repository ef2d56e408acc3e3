//! Ping endpoints: `POST /locations` and `POST /emergency`.
//!
//! An identified caller has their presence upserted under the endpoint's
//! mode. An anonymous caller must present a live, unblocked guest share
//! (`isGuest` + `shareToken`) and is rate limited per token; guest pings are
//! authorised but not stored.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tether_core::{
  model::{LocationFix, PresenceMode},
  share::{GuestCredentials, PingKind, ShareRegistry, token_fingerprint},
  store::TetherStore,
};
use tracing::debug;

use crate::{AppState, auth::MaybeAuthUser, error::ApiError};

/// Body accepted by both ping endpoints.
#[derive(Debug, Deserialize)]
pub struct PingBody {
  #[serde(flatten)]
  pub fix:   LocationFix,
  #[serde(flatten)]
  pub guest: GuestCredentials,
}

/// Which path authorised the ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PingPath {
  Authed,
  Guest,
}

#[derive(Debug, Serialize)]
pub struct PingReply {
  pub ok:       bool,
  pub accepted: bool,
  pub mode:     PingPath,
}

/// `POST /locations`
pub async fn ordinary<S, R>(
  State(state): State<AppState<S, R>>,
  MaybeAuthUser(caller): MaybeAuthUser,
  body: Result<Json<PingBody>, JsonRejection>,
) -> Result<Json<PingReply>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  ping(&state, caller, body, PresenceMode::Active, PingKind::Ordinary).await
}

/// `POST /emergency`
pub async fn emergency<S, R>(
  State(state): State<AppState<S, R>>,
  MaybeAuthUser(caller): MaybeAuthUser,
  body: Result<Json<PingBody>, JsonRejection>,
) -> Result<Json<PingReply>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  ping(&state, caller, body, PresenceMode::Emergency, PingKind::Emergency).await
}

async fn ping<S, R>(
  state: &AppState<S, R>,
  caller: Option<tether_core::UserId>,
  body: Result<Json<PingBody>, JsonRejection>,
  mode: PresenceMode,
  kind: PingKind,
) -> Result<Json<PingReply>, ApiError>
where
  S: TetherStore,
  R: ShareRegistry,
{
  let Json(body) = body?;
  body.fix.validate()?;

  let path = match caller {
    Some(user_id) => {
      state.presence().upsert(user_id, body.fix, mode).await?;
      PingPath::Authed
    }
    None => {
      let session = state.gate.authorize(&body.guest, kind).await?;
      debug!(share = %token_fingerprint(&session.token), ?kind, "guest ping");
      PingPath::Guest
    }
  };

  Ok(Json(PingReply { ok: true, accepted: true, mode: path }))
}

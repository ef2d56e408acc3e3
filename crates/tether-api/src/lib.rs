//! JSON HTTP API for Tether.
//!
//! Exposes an axum [`Router`] over any [`TetherStore`] and [`ShareRegistry`].
//! Identity comes from an injected [`TokenVerifier`]; TLS and process
//! concerns belong to the binary that serves it.
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | `GET`  | `/health` | none |
//! | `POST` | `/api/users/lookup` | bearer |
//! | `POST` | `/api/trust/request` | bearer |
//! | `GET`  | `/api/trust/requests/incoming` | bearer |
//! | `POST` | `/api/trust/requests/{id}/accept` | bearer |
//! | `POST` | `/api/trust/requests/{id}/deny` | bearer |
//! | `GET`  | `/api/trust/list` | bearer |
//! | `POST` | `/api/visibility/set` | bearer |
//! | `GET`  | `/api/live/visible` | bearer |
//! | `POST` | `/api/locations` | bearer or guest share |
//! | `POST` | `/api/emergency` | bearer or guest share |
//! | `POST` | `/api/shares/start` | none |
//! | `POST` | `/api/shares/end` | none |
//! | `POST` | `/api/shares/{token}/block` | none |

pub mod auth;
pub mod error;
pub mod live;
pub mod locations;
pub mod shares;
pub mod trust;
pub mod users;
pub mod visibility;


use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use serde_json::{Value, json};
use tether_core::{
  clock::Clock,
  identity::TokenVerifier,
  live::LiveVisibilityQuery,
  presence::PresenceStore,
  share::{GuestShareGate, ShareRegistry},
  store::TetherStore,
  trust::TrustGraph,
  visibility::VisibilityAcl,
};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, R> {
  pub store:        Arc<S>,
  pub clock:        Arc<dyn Clock>,
  pub gate:         Arc<GuestShareGate<R>>,
  pub verifier:     Arc<dyn TokenVerifier>,
  /// When `false`, the `x-dev-userid` header is accepted in place of a
  /// bearer token.
  pub require_auth: bool,
}

impl<S, R> Clone for AppState<S, R> {
  fn clone(&self) -> Self {
    Self {
      store:        self.store.clone(),
      clock:        self.clock.clone(),
      gate:         self.gate.clone(),
      verifier:     self.verifier.clone(),
      require_auth: self.require_auth,
    }
  }
}

impl<S: TetherStore, R: ShareRegistry> AppState<S, R> {
  pub fn trust(&self) -> TrustGraph<S> {
    TrustGraph::new(self.store.clone(), self.clock.clone())
  }

  pub fn acl(&self) -> VisibilityAcl<S> {
    VisibilityAcl::new(self.store.clone(), self.clock.clone())
  }

  pub fn presence(&self) -> PresenceStore<S> {
    PresenceStore::new(self.store.clone(), self.clock.clone())
  }

  pub fn live(&self) -> LiveVisibilityQuery<S> {
    LiveVisibilityQuery::new(self.store.clone(), self.clock.clone())
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router, with `/api` routes and `/health`.
pub fn router<S, R>(state: AppState<S, R>) -> Router
where
  S: TetherStore + 'static,
  R: ShareRegistry + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

fn api_router<S, R>(state: AppState<S, R>) -> Router
where
  S: TetherStore + 'static,
  R: ShareRegistry + 'static,
{
  Router::new()
    // Users
    .route("/users/lookup", post(users::lookup::<S, R>))
    // Trust
    .route("/trust/request", post(trust::request::<S, R>))
    .route("/trust/requests/incoming", get(trust::incoming::<S, R>))
    .route("/trust/requests/{id}/accept", post(trust::accept::<S, R>))
    .route("/trust/requests/{id}/deny", post(trust::deny::<S, R>))
    .route("/trust/list", get(trust::list::<S, R>))
    // Visibility
    .route("/visibility/set", post(visibility::set::<S, R>))
    .route("/live/visible", get(live::visible::<S, R>))
    // Pings
    .route("/locations", post(locations::ordinary::<S, R>))
    .route("/emergency", post(locations::emergency::<S, R>))
    // Guest shares
    .route("/shares/start", post(shares::start::<S, R>))
    .route("/shares/end", post(shares::end::<S, R>))
    .route("/shares/{token}/block", post(shares::block::<S, R>))
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "ok": true })) }

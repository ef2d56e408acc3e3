//! Tether server assembly: configuration, identity, profile seeding and the
//! HTTP application.

pub mod settings;
pub mod verifier;

use std::sync::Arc;

use axum::Router;
use tether_api::{AppState, users::normalize_email};
use tether_core::{
  UserId,
  clock::{Clock, SystemClock},
  identity::TokenVerifier,
  model::Profile,
  share::{GuestShareGate, ShareRegistry},
  store::TetherStore,
};
use thiserror::Error;
use tracing::info;

pub use settings::{ServerConfig, ShareBackend};
pub use verifier::Argon2TokenVerifier;

#[derive(Debug, Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("require_auth = false is not allowed in production")]
  DevAuthInProduction,

  #[error("guest ping interval of {0}s exceeds one day")]
  GuestInterval(u64),

  #[error("user {0} has an invalid token_hash")]
  InvalidTokenHash(UserId),

  #[error("user {0} is configured more than once")]
  DuplicateUser(UserId),

  #[error("hashing failed: {0}")]
  Hash(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Mirror the configured users into the profile table. Emails are stored
/// normalised so lookups can match them exactly.
pub async fn seed_profiles<S>(store: &S, cfg: &ServerConfig) -> Result<(), S::Error>
where
  S: TetherStore,
{
  for user in &cfg.users {
    store
      .upsert_profile(Profile {
        user_id:      user.user_id,
        email:        Some(normalize_email(&user.email)),
        display_name: user.display_name.clone(),
      })
      .await?;
  }
  info!(count = cfg.users.len(), "profiles seeded");
  Ok(())
}

/// Build the application router over `store`, with guest shares held in
/// `registry`.
pub fn app<S, R>(
  store: Arc<S>,
  registry: Arc<R>,
  verifier: Arc<dyn TokenVerifier>,
  cfg: &ServerConfig,
) -> Router
where
  S: TetherStore + 'static,
  R: ShareRegistry + 'static,
{
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let gate = GuestShareGate::new(registry, clock.clone(), cfg.guest);
  tether_api::router(AppState {
    store,
    clock,
    gate: Arc::new(gate),
    verifier,
    require_auth: cfg.require_auth,
  })
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use tether_core::share::InMemoryShareRegistry;
  use tether_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;
  use crate::{settings::UserEntry, verifier::hash_secret};

  fn config(user_id: Uuid) -> ServerConfig {
    let mut cfg = ServerConfig::from_builder(config::Config::builder()).unwrap();
    cfg.users = vec![UserEntry {
      user_id,
      email: "  Alice@Example.com ".into(),
      display_name: Some("Alice".into()),
      token_hash: hash_secret("s3cret").unwrap(),
    }];
    cfg
  }

  #[tokio::test]
  async fn seeding_normalises_email() {
    let id = Uuid::new_v4();
    let store = SqliteStore::open_in_memory().await.unwrap();
    seed_profiles(&store, &config(id)).await.unwrap();

    let profile = store
      .find_profile_by_email("alice@example.com".into())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(profile.user_id, id);
  }

  #[tokio::test]
  async fn assembled_app_authenticates_configured_user() {
    let id = Uuid::new_v4();
    let cfg = config(id);
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    seed_profiles(store.as_ref(), &cfg).await.unwrap();
    let verifier = Arc::new(Argon2TokenVerifier::new(&cfg.users).unwrap());
    let app = app(store, Arc::new(InMemoryShareRegistry::new()), verifier, &cfg);

    let req = Request::builder()
      .uri("/api/trust/list")
      .header(header::AUTHORIZATION, format!("Bearer {id}.s3cret"))
      .body(Body::empty())
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder()
      .uri("/api/trust/list")
      .header(header::AUTHORIZATION, format!("Bearer {id}.wrong"))
      .body(Body::empty())
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn sqlite_share_backend_serves_guest_pings() {
    let cfg = config(Uuid::new_v4());
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let verifier = Arc::new(Argon2TokenVerifier::new(&cfg.users).unwrap());
    let app = app(store.clone(), store, verifier, &cfg);

    let post = |uri: &str, body: serde_json::Value| {
      Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
    };

    let resp = app
      .clone()
      .oneshot(post("/api/shares/start", serde_json::json!({ "token": "t" })))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let ping = serde_json::json!({ "lat": 1.0, "lng": 2.0, "isGuest": true, "shareToken": "t" });
    let resp = app.clone().oneshot(post("/api/locations", ping.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.oneshot(post("/api/locations", ping)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
  }
}

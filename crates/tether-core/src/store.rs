//! The `TetherStore` trait and supporting filter types.
//!
//! The trait is implemented by storage backends (e.g. `tether-store-sqlite`)
//! and exposes only the row-level operations the services need: select,
//! upsert keyed by a conflict key, and status update. Every upsert is atomic
//! per row and last-write-wins; there is no optimistic concurrency control.
//!
//! All methods return `Send` futures so the trait can be used in multi-threaded
//! async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{
  PresenceRecord, Profile, TrustEdge, TrustStatus, UserId, VisibilityGrant,
};

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Parameters for [`TetherStore::list_edges`]. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
  pub requester_id: Option<UserId>,
  pub requested_id: Option<UserId>,
  /// Restrict `requested_id` to this set. An empty set matches nothing.
  pub requested_in: Option<Vec<UserId>>,
  pub status:       Option<TrustStatus>,
}

/// Parameters for [`TetherStore::list_grants`]. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct GrantFilter {
  pub owner_id:  Option<UserId>,
  pub viewer_id: Option<UserId>,
  /// Restrict `owner_id` to this set. An empty set matches nothing.
  pub owner_in:  Option<Vec<UserId>>,
  /// Restrict `viewer_id` to this set. An empty set matches nothing.
  pub viewer_in: Option<Vec<UserId>>,
  pub can_view:  Option<bool>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store behind Tether.
pub trait TetherStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Insert or replace the profile keyed by `user_id`.
  fn upsert_profile(
    &self,
    profile: Profile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Bulk lookup; ids with no profile are simply absent from the result.
  fn get_profiles(
    &self,
    user_ids: Vec<UserId>,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  /// Exact match on the stored (already normalised) email.
  fn find_profile_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  // ── Trust edges ───────────────────────────────────────────────────────

  fn get_edge(
    &self,
    edge_id: Uuid,
  ) -> impl Future<Output = Result<Option<TrustEdge>, Self::Error>> + Send + '_;

  fn find_edge(
    &self,
    requester_id: UserId,
    requested_id: UserId,
  ) -> impl Future<Output = Result<Option<TrustEdge>, Self::Error>> + Send + '_;

  /// Upsert on the `(requester_id, requested_id)` conflict key. An existing
  /// row keeps its `id` and `created_at`; `status` and `updated_at` are
  /// overwritten.
  fn upsert_edge(
    &self,
    requester_id: UserId,
    requested_id: UserId,
    status: TrustStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<TrustEdge, Self::Error>> + Send + '_;

  /// Set the status of an existing edge. Returns `None` if it does not exist.
  fn update_edge_status(
    &self,
    edge_id: Uuid,
    status: TrustStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<TrustEdge>, Self::Error>> + Send + '_;

  /// Edges matching `filter`, newest `created_at` first.
  fn list_edges(
    &self,
    filter: EdgeFilter,
  ) -> impl Future<Output = Result<Vec<TrustEdge>, Self::Error>> + Send + '_;

  // ── Visibility ────────────────────────────────────────────────────────

  /// Upsert on the `(owner_id, viewer_id)` conflict key.
  fn upsert_grant(
    &self,
    grant: VisibilityGrant,
  ) -> impl Future<Output = Result<VisibilityGrant, Self::Error>> + Send + '_;

  fn list_grants(
    &self,
    filter: GrantFilter,
  ) -> impl Future<Output = Result<Vec<VisibilityGrant>, Self::Error>> + Send + '_;

  // ── Presence ──────────────────────────────────────────────────────────

  /// Overwrite the single presence row keyed by `user_id`. No history is kept.
  fn upsert_presence(
    &self,
    record: PresenceRecord,
  ) -> impl Future<Output = Result<PresenceRecord, Self::Error>> + Send + '_;

  /// Rows with `expires_at > now`, optionally restricted to `candidates`.
  ///
  /// Expiry is soft: implementations must filter here rather than rely on
  /// expired rows having been deleted.
  fn list_live_presence(
    &self,
    now: DateTime<Utc>,
    candidates: Option<Vec<UserId>>,
  ) -> impl Future<Output = Result<Vec<PresenceRecord>, Self::Error>> + Send + '_;
}

//! The viewer read path: who can I see right now.
//!
//! An owner is visible to a viewer iff all three hold at read time:
//! the owner has a live presence row, the owner granted the viewer
//! `can_view = true`, and `viewer → owner` trust is accepted. Each step
//! narrows the candidate set and the query stops as soon as it is empty.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  Error, Result,
  clock::Clock,
  model::{PresenceMode, PresenceRecord, Profile, TrustStatus, UserId},
  presence::PresenceStore,
  store::{EdgeFilter, TetherStore},
  visibility::VisibilityAcl,
};

/// One visible owner, as returned by `GET /live/visible`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleUser {
  pub user_id:      UserId,
  pub lat:          f64,
  pub lng:          f64,
  pub accuracy_m:   Option<f64>,
  /// The owner's current mode, so emergency markers stand out.
  pub mode:         PresenceMode,
  pub updated_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email:        Option<String>,
}

impl VisibleUser {
  fn new(p: PresenceRecord, profile: Option<&Profile>) -> Self {
    Self {
      user_id:      p.user_id,
      lat:          p.lat,
      lng:          p.lng,
      accuracy_m:   p.accuracy_m,
      mode:         p.mode,
      updated_at:   p.updated_at,
      expires_at:   p.expires_at,
      display_name: profile.and_then(|p| p.display_name.clone()),
      email:        profile.and_then(|p| p.email.clone()),
    }
  }
}

pub struct LiveVisibilityQuery<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: TetherStore> LiveVisibilityQuery<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Owners `viewer_id` may see right now. Ordering is unspecified.
  pub async fn visible_for(&self, viewer_id: UserId) -> Result<Vec<VisibleUser>> {
    // 1. Live presence.
    let live = PresenceStore::new(self.store.clone(), self.clock.clone())
      .query_live(None)
      .await?;
    if live.is_empty() {
      return Ok(Vec::new());
    }

    // 2. Owners that granted this viewer.
    let live_ids: Vec<UserId> = live.iter().map(|p| p.user_id).collect();
    let allowed = VisibilityAcl::new(self.store.clone(), self.clock.clone())
      .owners_granting(viewer_id, live_ids)
      .await?;
    if allowed.is_empty() {
      return Ok(Vec::new());
    }

    // 3. Of those, owners the viewer still has accepted trust with.
    let trusted: HashSet<UserId> = self
      .store
      .list_edges(EdgeFilter {
        requester_id: Some(viewer_id),
        requested_in: Some(allowed),
        status: Some(TrustStatus::Accepted),
        ..Default::default()
      })
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|e| e.requested_id)
      .collect();
    if trusted.is_empty() {
      return Ok(Vec::new());
    }

    // 4. Intersect and attach profiles.
    let visible: Vec<PresenceRecord> = live
      .into_iter()
      .filter(|p| trusted.contains(&p.user_id))
      .collect();

    let profiles: HashMap<UserId, Profile> = self
      .store
      .get_profiles(visible.iter().map(|p| p.user_id).collect())
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|p| (p.user_id, p))
      .collect();

    Ok(
      visible
        .into_iter()
        .map(|p| {
          let profile = profiles.get(&p.user_id);
          VisibleUser::new(p, profile)
        })
        .collect(),
    )
  }
}

//! Upsert-and-expire presence: where is a user right now.

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::debug;

use crate::{
  Error, Result,
  clock::Clock,
  model::{LocationFix, PresenceMode, PresenceRecord, UserId},
  store::TetherStore,
};

/// How long a fix stays live after it was written.
pub const PRESENCE_TTL_SECS: i64 = 90;

pub fn presence_ttl() -> TimeDelta { TimeDelta::seconds(PRESENCE_TTL_SECS) }

pub struct PresenceStore<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: TetherStore> PresenceStore<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Overwrite `user_id`'s presence with `fix`, live for the next 90 seconds.
  pub async fn upsert(
    &self,
    user_id: UserId,
    fix: LocationFix,
    mode: PresenceMode,
  ) -> Result<PresenceRecord> {
    fix.validate()?;

    let now = self.clock.now();
    let record = PresenceRecord {
      user_id,
      lat: fix.lat,
      lng: fix.lng,
      accuracy_m: fix.accuracy_m,
      mode,
      updated_at: now,
      expires_at: now + presence_ttl(),
    };

    let stored = self
      .store
      .upsert_presence(record)
      .await
      .map_err(Error::store)?;
    debug!(%user_id, mode = mode.as_ref(), "presence updated");
    Ok(stored)
  }

  /// Live rows only, optionally restricted to `candidates`.
  pub async fn query_live(
    &self,
    candidates: Option<Vec<UserId>>,
  ) -> Result<Vec<PresenceRecord>> {
    if candidates.as_ref().is_some_and(Vec::is_empty) {
      return Ok(Vec::new());
    }
    let now = self.clock.now();
    let mut rows = self
      .store
      .list_live_presence(now, candidates)
      .await
      .map_err(Error::store)?;
    rows.retain(|r| r.is_live_at(now));
    Ok(rows)
  }
}

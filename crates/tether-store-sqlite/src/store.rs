//! [`SqliteStore`], the SQLite implementation of [`TetherStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use tracing::info;
use tether_core::{
  model::{PresenceRecord, Profile, TrustEdge, TrustStatus, UserId, VisibilityGrant},
  store::{EdgeFilter, GrantFilter, TetherStore},
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    EDGE_COLUMNS, GRANT_COLUMNS, PRESENCE_COLUMNS, PROFILE_COLUMNS, RawEdge,
    RawGrant, RawPresence, RawProfile, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tether store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    info!(path = %path.display(), "sqlite store opened");
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Dynamic filters ─────────────────────────────────────────────────────────

/// Accumulates `WHERE` conditions and their positional parameters.
#[derive(Default)]
struct Conditions {
  conds:  Vec<String>,
  params: Vec<Value>,
}

impl Conditions {
  fn eq(&mut self, column: &str, value: Value) {
    self.conds.push(format!("{column} = ?"));
    self.params.push(value);
  }

  fn eq_uuid(&mut self, column: &str, id: Option<Uuid>) {
    if let Some(id) = id {
      self.eq(column, Value::Text(encode_uuid(id)));
    }
  }

  /// `column IN (...)`; an empty set matches nothing.
  fn is_in(&mut self, column: &str, ids: Option<Vec<Uuid>>) {
    let Some(ids) = ids else { return };
    if ids.is_empty() {
      self.conds.push("0".to_owned());
      return;
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    self.conds.push(format!("{column} IN ({placeholders})"));
    self
      .params
      .extend(ids.into_iter().map(|id| Value::Text(encode_uuid(id))));
  }

  fn where_clause(&self) -> String {
    if self.conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", self.conds.join(" AND "))
    }
  }
}

// ─── TetherStore impl ────────────────────────────────────────────────────────

impl TetherStore for SqliteStore {
  type Error = crate::Error;

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn upsert_profile(&self, profile: Profile) -> Result<Profile> {
    let id_str       = encode_uuid(profile.user_id);
    let email        = profile.email.clone();
    let display_name = profile.display_name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (user_id, email, display_name) VALUES (?1, ?2, ?3)
           ON CONFLICT (user_id) DO UPDATE SET
             email = excluded.email,
             display_name = excluded.display_name",
          rusqlite::params![id_str, email, display_name],
        )?;
        Ok(())
      })
      .await?;

    Ok(profile)
  }

  async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
            rusqlite::params![id_str],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn get_profiles(&self, user_ids: Vec<UserId>) -> Result<Vec<Profile>> {
    if user_ids.is_empty() {
      return Ok(Vec::new());
    }
    let mut filter = Conditions::default();
    filter.is_in("user_id", Some(user_ids));

    let raws: Vec<RawProfile> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {PROFILE_COLUMNS} FROM profiles {}",
          filter.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(filter.params), RawProfile::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfile::into_profile).collect()
  }

  async fn find_profile_by_email(&self, email: String) -> Result<Option<Profile>> {
    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = ?1 LIMIT 1"),
            rusqlite::params![email],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  // ── Trust edges ───────────────────────────────────────────────────────────

  async fn get_edge(&self, edge_id: Uuid) -> Result<Option<TrustEdge>> {
    let id_str = encode_uuid(edge_id);

    let raw: Option<RawEdge> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {EDGE_COLUMNS} FROM trusted_contacts WHERE id = ?1"),
            rusqlite::params![id_str],
            RawEdge::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEdge::into_edge).transpose()
  }

  async fn find_edge(
    &self,
    requester_id: UserId,
    requested_id: UserId,
  ) -> Result<Option<TrustEdge>> {
    let requester_str = encode_uuid(requester_id);
    let requested_str = encode_uuid(requested_id);

    let raw: Option<RawEdge> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {EDGE_COLUMNS} FROM trusted_contacts
               WHERE requester_user_id = ?1 AND requested_user_id = ?2"
            ),
            rusqlite::params![requester_str, requested_str],
            RawEdge::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEdge::into_edge).transpose()
  }

  async fn upsert_edge(
    &self,
    requester_id: UserId,
    requested_id: UserId,
    status:       TrustStatus,
    at:           DateTime<Utc>,
  ) -> Result<TrustEdge> {
    let id_str        = encode_uuid(Uuid::new_v4());
    let requester_str = encode_uuid(requester_id);
    let requested_str = encode_uuid(requested_id);
    let status_str    = status.as_ref().to_owned();
    let at_str        = encode_dt(at);

    let raw: RawEdge = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO trusted_contacts
               (id, requester_user_id, requested_user_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (requester_user_id, requested_user_id) DO UPDATE SET
               status = excluded.status,
               updated_at = excluded.updated_at
             RETURNING {EDGE_COLUMNS}"
          ),
          rusqlite::params![id_str, requester_str, requested_str, status_str, at_str],
          RawEdge::from_row,
        )?)
      })
      .await?;

    raw.into_edge()
  }

  async fn update_edge_status(
    &self,
    edge_id: Uuid,
    status:  TrustStatus,
    at:      DateTime<Utc>,
  ) -> Result<Option<TrustEdge>> {
    let id_str     = encode_uuid(edge_id);
    let status_str = status.as_ref().to_owned();
    let at_str     = encode_dt(at);

    let raw: Option<RawEdge> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "UPDATE trusted_contacts SET status = ?2, updated_at = ?3
               WHERE id = ?1
               RETURNING {EDGE_COLUMNS}"
            ),
            rusqlite::params![id_str, status_str, at_str],
            RawEdge::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEdge::into_edge).transpose()
  }

  async fn list_edges(&self, filter: EdgeFilter) -> Result<Vec<TrustEdge>> {
    let mut conds = Conditions::default();
    conds.eq_uuid("requester_user_id", filter.requester_id);
    conds.eq_uuid("requested_user_id", filter.requested_id);
    conds.is_in("requested_user_id", filter.requested_in);
    if let Some(status) = filter.status {
      conds.eq("status", Value::Text(status.as_ref().to_owned()));
    }

    let raws: Vec<RawEdge> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {EDGE_COLUMNS} FROM trusted_contacts {}
           ORDER BY created_at DESC",
          conds.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(conds.params), RawEdge::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEdge::into_edge).collect()
  }

  // ── Visibility ────────────────────────────────────────────────────────────

  async fn upsert_grant(&self, grant: VisibilityGrant) -> Result<VisibilityGrant> {
    let owner_str  = encode_uuid(grant.owner_id);
    let viewer_str = encode_uuid(grant.viewer_id);
    let can_view   = grant.can_view;
    let at_str     = encode_dt(grant.updated_at);

    let raw: RawGrant = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO live_visibility (owner_user_id, viewer_user_id, can_view, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (owner_user_id, viewer_user_id) DO UPDATE SET
               can_view = excluded.can_view,
               updated_at = excluded.updated_at
             RETURNING {GRANT_COLUMNS}"
          ),
          rusqlite::params![owner_str, viewer_str, can_view, at_str],
          RawGrant::from_row,
        )?)
      })
      .await?;

    raw.into_grant()
  }

  async fn list_grants(&self, filter: GrantFilter) -> Result<Vec<VisibilityGrant>> {
    let mut conds = Conditions::default();
    conds.eq_uuid("owner_user_id", filter.owner_id);
    conds.eq_uuid("viewer_user_id", filter.viewer_id);
    conds.is_in("owner_user_id", filter.owner_in);
    conds.is_in("viewer_user_id", filter.viewer_in);
    if let Some(can_view) = filter.can_view {
      conds.eq("can_view", Value::Integer(i64::from(can_view)));
    }

    let raws: Vec<RawGrant> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {GRANT_COLUMNS} FROM live_visibility {}",
          conds.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(conds.params), RawGrant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGrant::into_grant).collect()
  }

  // ── Presence ──────────────────────────────────────────────────────────────

  async fn upsert_presence(&self, record: PresenceRecord) -> Result<PresenceRecord> {
    let id_str     = encode_uuid(record.user_id);
    let lat        = record.lat;
    let lng        = record.lng;
    let accuracy_m = record.accuracy_m;
    let mode_str   = record.mode.as_ref().to_owned();
    let updated    = encode_dt(record.updated_at);
    let expires    = encode_dt(record.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO live_presence
             (user_id, lat, lng, accuracy_m, mode, updated_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (user_id) DO UPDATE SET
             lat = excluded.lat,
             lng = excluded.lng,
             accuracy_m = excluded.accuracy_m,
             mode = excluded.mode,
             updated_at = excluded.updated_at,
             expires_at = excluded.expires_at",
          rusqlite::params![id_str, lat, lng, accuracy_m, mode_str, updated, expires],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn list_live_presence(
    &self,
    now:        DateTime<Utc>,
    candidates: Option<Vec<UserId>>,
  ) -> Result<Vec<PresenceRecord>> {
    let mut conds = Conditions::default();
    conds.conds.push("expires_at > ?".to_owned());
    conds.params.push(Value::Text(encode_dt(now)));
    conds.is_in("user_id", candidates);

    let raws: Vec<RawPresence> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {PRESENCE_COLUMNS} FROM live_presence {}",
          conds.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(conds.params), RawPresence::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPresence::into_record).collect()
  }
}

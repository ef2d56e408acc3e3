//! Encoding and decoding helpers between Tether domain types and the plain
//! column representations stored in SQLite.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexicographic comparison in SQL matches chronological
//! order. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use tether_core::{
  model::{PresenceMode, PresenceRecord, Profile, TrustEdge, TrustStatus, VisibilityGrant},
  share::{ShareSession, ShareStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_variant<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
  T::from_str(value).map_err(|_| Error::UnknownVariant {
    column,
    value: value.to_owned(),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const EDGE_COLUMNS: &str =
  "id, requester_user_id, requested_user_id, status, created_at, updated_at";

/// A `trusted_contacts` row as read from SQLite.
pub struct RawEdge {
  pub id:           String,
  pub requester_id: String,
  pub requested_id: String,
  pub status:       String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawEdge {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      requester_id: row.get(1)?,
      requested_id: row.get(2)?,
      status:       row.get(3)?,
      created_at:   row.get(4)?,
      updated_at:   row.get(5)?,
    })
  }

  pub fn into_edge(self) -> Result<TrustEdge> {
    Ok(TrustEdge {
      id:           decode_uuid(&self.id)?,
      requester_id: decode_uuid(&self.requester_id)?,
      requested_id: decode_uuid(&self.requested_id)?,
      status:       decode_variant::<TrustStatus>("status", &self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub const GRANT_COLUMNS: &str = "owner_user_id, viewer_user_id, can_view, updated_at";

pub struct RawGrant {
  pub owner_id:   String,
  pub viewer_id:  String,
  pub can_view:   bool,
  pub updated_at: String,
}

impl RawGrant {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      owner_id:   row.get(0)?,
      viewer_id:  row.get(1)?,
      can_view:   row.get(2)?,
      updated_at: row.get(3)?,
    })
  }

  pub fn into_grant(self) -> Result<VisibilityGrant> {
    Ok(VisibilityGrant {
      owner_id:   decode_uuid(&self.owner_id)?,
      viewer_id:  decode_uuid(&self.viewer_id)?,
      can_view:   self.can_view,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const PRESENCE_COLUMNS: &str =
  "user_id, lat, lng, accuracy_m, mode, updated_at, expires_at";

pub struct RawPresence {
  pub user_id:    String,
  pub lat:        f64,
  pub lng:        f64,
  pub accuracy_m: Option<f64>,
  pub mode:       String,
  pub updated_at: String,
  pub expires_at: String,
}

impl RawPresence {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      lat:        row.get(1)?,
      lng:        row.get(2)?,
      accuracy_m: row.get(3)?,
      mode:       row.get(4)?,
      updated_at: row.get(5)?,
      expires_at: row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<PresenceRecord> {
    Ok(PresenceRecord {
      user_id:    decode_uuid(&self.user_id)?,
      lat:        self.lat,
      lng:        self.lng,
      accuracy_m: self.accuracy_m,
      mode:       decode_variant::<PresenceMode>("mode", &self.mode)?,
      updated_at: decode_dt(&self.updated_at)?,
      expires_at: decode_dt(&self.expires_at)?,
    })
  }
}

pub const PROFILE_COLUMNS: &str = "user_id, email, display_name";

pub struct RawProfile {
  pub user_id:      String,
  pub email:        Option<String>,
  pub display_name: Option<String>,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      email:        row.get(1)?,
      display_name: row.get(2)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      user_id:      decode_uuid(&self.user_id)?,
      email:        self.email,
      display_name: self.display_name,
    })
  }
}

pub const SHARE_COLUMNS: &str = "token, status, blocked, reason, created_at, ended_at";

pub struct RawShare {
  pub token:      String,
  pub status:     String,
  pub blocked:    bool,
  pub reason:     String,
  pub created_at: String,
  pub ended_at:   Option<String>,
}

impl RawShare {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      token:      row.get(0)?,
      status:     row.get(1)?,
      blocked:    row.get(2)?,
      reason:     row.get(3)?,
      created_at: row.get(4)?,
      ended_at:   row.get(5)?,
    })
  }

  pub fn into_session(self) -> Result<ShareSession> {
    Ok(ShareSession {
      token:      self.token,
      status:     decode_variant::<ShareStatus>("status", &self.status)?,
      blocked:    self.blocked,
      reason:     self.reason,
      created_at: decode_dt(&self.created_at)?,
      ended_at:   self.ended_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeDelta, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let later = base + TimeDelta::milliseconds(500);
    assert!(encode_dt(base) < encode_dt(later));
    assert_eq!(encode_dt(base).len(), encode_dt(later).len());
    assert_eq!(decode_dt(&encode_dt(later)).unwrap(), later);
  }

  #[test]
  fn unknown_status_is_reported() {
    let err = decode_variant::<TrustStatus>("status", "blocked").unwrap_err();
    assert!(matches!(err, Error::UnknownVariant { column: "status", .. }));
  }
}

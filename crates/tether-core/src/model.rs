//! Domain records shared by every layer.
//!
//! Wire shapes are camelCase JSON, matching what the HTTP API returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Opaque user identifier issued by the identity provider.
pub type UserId = Uuid;

// ─── Profiles ────────────────────────────────────────────────────────────────

/// Display information for a user. Either field may be unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub user_id:      UserId,
  pub email:        Option<String>,
  pub display_name: Option<String>,
}

// ─── Trust ───────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrustStatus {
  Pending,
  Accepted,
  Denied,
}

/// A directed trust relationship. The pair `(requester_id, requested_id)` is
/// unique; only the `requested_id` party may move it out of `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustEdge {
  pub id:           Uuid,
  pub requester_id: UserId,
  pub requested_id: UserId,
  pub status:       TrustStatus,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

// ─── Visibility ──────────────────────────────────────────────────────────────

/// Whether `viewer_id` may currently see `owner_id`'s live location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityGrant {
  pub owner_id:   UserId,
  pub viewer_id:  UserId,
  pub can_view:   bool,
  pub updated_at: DateTime<Utc>,
}

// ─── Presence ────────────────────────────────────────────────────────────────

/// The tracking mode a presence row was written under. Viewers use it to
/// render emergency markers differently.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PresenceMode {
  Active,
  Emergency,
}

/// One position fix as reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
  pub lat:        f64,
  pub lng:        f64,
  #[serde(default)]
  pub accuracy_m: Option<f64>,
}

impl LocationFix {
  pub fn new(lat: f64, lng: f64, accuracy_m: Option<f64>) -> Self {
    Self { lat, lng, accuracy_m }
  }

  /// Reject coordinates outside the WGS84 range and negative accuracies.
  pub fn validate(&self) -> Result<()> {
    if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
      return Err(Error::invalid("lat must be within [-90, 90]"));
    }
    if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
      return Err(Error::invalid("lng must be within [-180, 180]"));
    }
    if let Some(acc) = self.accuracy_m
      && (!acc.is_finite() || acc < 0.0)
    {
      return Err(Error::invalid("accuracyM must be a non-negative number"));
    }
    Ok(())
  }
}

/// The latest fix for a user. Logically absent once `expires_at <= now`,
/// whether or not the row still physically exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
  pub user_id:    UserId,
  pub lat:        f64,
  pub lng:        f64,
  pub accuracy_m: Option<f64>,
  pub mode:       PresenceMode,
  pub updated_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl PresenceRecord {
  pub fn is_live_at(&self, now: DateTime<Utc>) -> bool { self.expires_at > now }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn status_strings_roundtrip() {
    assert_eq!(TrustStatus::Accepted.as_ref(), "accepted");
    assert_eq!(TrustStatus::from_str("denied").unwrap(), TrustStatus::Denied);
    assert_eq!(PresenceMode::Emergency.as_ref(), "emergency");
    assert!(PresenceMode::from_str("idle").is_err());
  }

  #[test]
  fn fix_validation() {
    assert!(LocationFix::new(51.5, -0.12, Some(8.0)).validate().is_ok());
    assert!(LocationFix::new(91.0, 0.0, None).validate().is_err());
    assert!(LocationFix::new(0.0, -180.5, None).validate().is_err());
    assert!(LocationFix::new(0.0, 0.0, Some(-1.0)).validate().is_err());
    assert!(LocationFix::new(f64::NAN, 0.0, None).validate().is_err());
  }

  #[test]
  fn fix_accepts_missing_accuracy() {
    let fix: LocationFix =
      serde_json::from_str(r#"{"lat": 10.0, "lng": 20.0}"#).unwrap();
    assert_eq!(fix.accuracy_m, None);
  }
}

//! Guest share tokens: a trust-free, token-scoped grant for unauthenticated
//! pings.
//!
//! A [`ShareSession`] is registered by the sharer, can be ended (terminal) or
//! blocked (an independent kill switch), and every guest ping must pass
//! [`GuestShareGate::authorize_ping`], which also enforces a per-token minimum
//! interval. Session and rate-limit state live behind [`ShareRegistry`] so a
//! multi-process deployment can swap the in-process map for a shared store.

use std::{collections::HashMap, convert::Infallible, future::Future, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, EnumString};
use tracing::{debug, info, warn};

use crate::{Error, Result, clock::Clock};

// ─── Sessions ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ShareStatus {
  Live,
  /// Terminal: a token never returns to `live`.
  Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareSession {
  pub token:      String,
  pub status:     ShareStatus,
  pub blocked:    bool,
  pub reason:     String,
  pub created_at: DateTime<Utc>,
  pub ended_at:   Option<DateTime<Utc>>,
}

/// Reason recorded when the sharer gives none.
pub const DEFAULT_REASON: &str = "manual";

/// Short, non-reversible token identifier for logs.
pub fn token_fingerprint(token: &str) -> String {
  let digest = Sha256::digest(token.as_bytes());
  hex::encode(&digest[..6])
}

// ─── Rate limiting ───────────────────────────────────────────────────────────

/// Which guest endpoint a ping targets. Each kind has its own rate-limit key
/// and minimum interval, so ordinary and emergency pings never throttle each
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingKind {
  Ordinary,
  Emergency,
}

impl PingKind {
  pub fn rate_key(self, token: &str) -> String {
    match self {
      Self::Ordinary => format!("share:{token}"),
      Self::Emergency => format!("emergency:{token}"),
    }
  }
}

/// Minimum spacing between accepted guest pings per token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestLimits {
  pub ordinary_min_interval_secs:  u64,
  pub emergency_min_interval_secs: u64,
}

impl Default for GuestLimits {
  fn default() -> Self {
    Self {
      ordinary_min_interval_secs:  60,
      emergency_min_interval_secs: 30,
    }
  }
}

impl GuestLimits {
  pub fn min_interval_secs(&self, kind: PingKind) -> u64 {
    match kind {
      PingKind::Ordinary => self.ordinary_min_interval_secs,
      PingKind::Emergency => self.emergency_min_interval_secs,
    }
  }
}

/// `secs` as a [`TimeDelta`], saturating at the largest representable span.
pub fn interval_from_secs(secs: u64) -> TimeDelta {
  i64::try_from(secs)
    .ok()
    .and_then(TimeDelta::try_seconds)
    .unwrap_or(TimeDelta::MAX)
}

/// Outcome of [`ShareRegistry::check_and_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
  /// `now` was recorded as the last accepted ping.
  Allowed,
  /// Too soon; nothing was recorded.
  Wait { wait_ms: u64 },
}

/// Sliding minimum interval: allowed iff `now - last >= min_interval`.
pub fn rate_decision(
  last: Option<DateTime<Utc>>,
  min_interval: TimeDelta,
  now: DateTime<Utc>,
) -> RateDecision {
  match last {
    Some(last) if now - last < min_interval => {
      let wait = min_interval - (now - last);
      RateDecision::Wait { wait_ms: wait.num_milliseconds().max(0) as u64 }
    }
    _ => RateDecision::Allowed,
  }
}

// ─── Registry trait ──────────────────────────────────────────────────────────

/// Backing store for share sessions and rate-limit marks.
pub trait ShareRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_share(
    &self,
    token: String,
  ) -> impl Future<Output = Result<Option<ShareSession>, Self::Error>> + Send + '_;

  /// Insert or replace the session keyed by its token.
  fn put_share(
    &self,
    session: ShareSession,
  ) -> impl Future<Output = Result<ShareSession, Self::Error>> + Send + '_;

  /// Atomically compare `now` with the last accepted mark under `key` and
  /// record `now` if the interval has elapsed.
  fn check_and_record(
    &self,
    key: String,
    min_interval: TimeDelta,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<RateDecision, Self::Error>> + Send + '_;

  /// Forget the marks under `keys`.
  fn clear_marks(
    &self,
    keys: Vec<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Process-local registry. Only correct for a single server instance.
#[derive(Debug, Default)]
pub struct InMemoryShareRegistry {
  sessions: Mutex<HashMap<String, ShareSession>>,
  marks:    Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryShareRegistry {
  pub fn new() -> Self { Self::default() }
}

impl ShareRegistry for InMemoryShareRegistry {
  type Error = Infallible;

  async fn get_share(&self, token: String) -> Result<Option<ShareSession>, Infallible> {
    Ok(self.sessions.lock().get(&token).cloned())
  }

  async fn put_share(&self, session: ShareSession) -> Result<ShareSession, Infallible> {
    self
      .sessions
      .lock()
      .insert(session.token.clone(), session.clone());
    Ok(session)
  }

  async fn check_and_record(
    &self,
    key: String,
    min_interval: TimeDelta,
    now: DateTime<Utc>,
  ) -> Result<RateDecision, Infallible> {
    let mut marks = self.marks.lock();
    let decision = rate_decision(marks.get(&key).copied(), min_interval, now);
    if decision == RateDecision::Allowed {
      marks.insert(key, now);
    }
    Ok(decision)
  }

  async fn clear_marks(&self, keys: Vec<String>) -> Result<(), Infallible> {
    let mut marks = self.marks.lock();
    for key in keys {
      marks.remove(&key);
    }
    Ok(())
  }
}

#[cfg(test)]
impl InMemoryShareRegistry {
  fn mark_count(&self) -> usize { self.marks.lock().len() }
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// What an unauthenticated caller presented alongside a ping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCredentials {
  #[serde(default)]
  pub is_guest:    bool,
  pub share_token: Option<String>,
}

pub struct GuestShareGate<R> {
  registry: Arc<R>,
  clock:    Arc<dyn Clock>,
  limits:   GuestLimits,
}

impl<R: ShareRegistry> GuestShareGate<R> {
  pub fn new(registry: Arc<R>, clock: Arc<dyn Clock>, limits: GuestLimits) -> Self {
    Self { registry, clock, limits }
  }

  pub fn limits(&self) -> GuestLimits { self.limits }

  pub async fn get(&self, token: &str) -> Result<Option<ShareSession>> {
    self
      .registry
      .get_share(token.to_owned())
      .await
      .map_err(Error::store)
  }

  /// Register `token` as live.
  ///
  /// Re-starting a live token clears `blocked`. A supplied `reason`
  /// replaces the stored one, otherwise it is kept. An ended token cannot
  /// be restarted.
  pub async fn start_share(
    &self,
    token: &str,
    reason: Option<String>,
  ) -> Result<ShareSession> {
    let token = require_token(token)?;
    let reason = reason.filter(|r| !r.trim().is_empty());

    let session = match self.get(token).await? {
      Some(existing) if existing.status == ShareStatus::Ended => {
        return Err(Error::Forbidden("share_ended"));
      }
      Some(existing) => ShareSession {
        blocked: false,
        reason: reason.unwrap_or(existing.reason.clone()),
        ..existing
      },
      None => ShareSession {
        token:      token.to_owned(),
        status:     ShareStatus::Live,
        blocked:    false,
        reason:     reason.unwrap_or_else(|| DEFAULT_REASON.to_owned()),
        created_at: self.clock.now(),
        ended_at:   None,
      },
    };

    let stored = self.put(session).await?;
    info!(share = %token_fingerprint(token), reason = %stored.reason, "share started");
    Ok(stored)
  }

  /// End `token`. Terminal.
  pub async fn end_share(&self, token: &str) -> Result<ShareSession> {
    let token = require_token(token)?;
    let existing = self.get(token).await?.ok_or(Error::NotFound("share"))?;
    let stored = self
      .put(ShareSession {
        status: ShareStatus::Ended,
        ended_at: existing.ended_at.or(Some(self.clock.now())),
        ..existing
      })
      .await?;
    self
      .registry
      .clear_marks(vec![
        PingKind::Ordinary.rate_key(token),
        PingKind::Emergency.rate_key(token),
      ])
      .await
      .map_err(Error::store)?;
    info!(share = %token_fingerprint(token), "share ended");
    Ok(stored)
  }

  /// Block `token` without ending it.
  pub async fn block(&self, token: &str) -> Result<ShareSession> {
    let token = require_token(token)?;
    let existing = self.get(token).await?.ok_or(Error::NotFound("share"))?;
    let stored = self.put(ShareSession { blocked: true, ..existing }).await?;
    warn!(share = %token_fingerprint(token), "share blocked");
    Ok(stored)
  }

  /// Authorize a guest ping of `kind` using the configured interval.
  pub async fn authorize(
    &self,
    creds: &GuestCredentials,
    kind: PingKind,
  ) -> Result<ShareSession> {
    let secs = self.limits.min_interval_secs(kind);
    self.authorize_ping(creds, kind, secs).await
  }

  /// Check the session behind `creds` and apply the per-token sliding
  /// minimum interval of `min_interval_secs` under `kind`'s rate key.
  pub async fn authorize_ping(
    &self,
    creds: &GuestCredentials,
    kind: PingKind,
    min_interval_secs: u64,
  ) -> Result<ShareSession> {
    let token = match (&creds.share_token, creds.is_guest) {
      (Some(t), true) if !t.trim().is_empty() => t.trim(),
      _ => return Err(Error::Forbidden("share_required")),
    };

    let session = match self.get(token).await? {
      Some(s) if s.status == ShareStatus::Live => s,
      _ => return Err(Error::Forbidden("invalid_share")),
    };
    if session.blocked {
      return Err(Error::Forbidden("share_blocked"));
    }

    let min_interval = interval_from_secs(min_interval_secs);
    let decision = self
      .registry
      .check_and_record(kind.rate_key(token), min_interval, self.clock.now())
      .await
      .map_err(Error::store)?;

    match decision {
      RateDecision::Allowed => {
        debug!(share = %token_fingerprint(token), ?kind, "guest ping accepted");
        Ok(session)
      }
      RateDecision::Wait { wait_ms } => Err(Error::RateLimited { wait_ms }),
    }
  }

  async fn put(&self, session: ShareSession) -> Result<ShareSession> {
    self
      .registry
      .put_share(session)
      .await
      .map_err(Error::store)
  }
}

fn require_token(token: &str) -> Result<&str> {
  let token = token.trim();
  if token.is_empty() {
    return Err(Error::invalid("missing_token"));
  }
  Ok(token)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::clock::ManualClock;

  fn setup() -> (Arc<ManualClock>, GuestShareGate<InMemoryShareRegistry>) {
    let clock = Arc::new(ManualClock::new(
      Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    let gate = GuestShareGate::new(
      Arc::new(InMemoryShareRegistry::new()),
      clock.clone(),
      GuestLimits::default(),
    );
    (clock, gate)
  }

  fn guest(token: &str) -> GuestCredentials {
    GuestCredentials { is_guest: true, share_token: Some(token.into()) }
  }

  #[tokio::test]
  async fn start_creates_live_session_with_default_reason() {
    let (_, gate) = setup();
    let s = gate.start_share("tok", None).await.unwrap();
    assert_eq!(s.status, ShareStatus::Live);
    assert!(!s.blocked);
    assert_eq!(s.reason, DEFAULT_REASON);
  }

  #[tokio::test]
  async fn restart_replaces_reason_only_when_given() {
    let (_, gate) = setup();
    gate.start_share("tok", Some("walk home".into())).await.unwrap();
    let kept = gate.start_share("tok", None).await.unwrap();
    assert_eq!(kept.reason, "walk home");
    let replaced = gate.start_share("tok", Some("emergency".into())).await.unwrap();
    assert_eq!(replaced.reason, "emergency");
  }

  #[tokio::test]
  async fn missing_token_is_invalid() {
    let (_, gate) = setup();
    assert!(matches!(
      gate.start_share("  ", None).await,
      Err(Error::InvalidArgument(_))
    ));
  }

  #[tokio::test]
  async fn end_and_block_unknown_token_not_found() {
    let (_, gate) = setup();
    assert!(matches!(gate.end_share("nope").await, Err(Error::NotFound(_))));
    assert!(matches!(gate.block("nope").await, Err(Error::NotFound(_))));
  }

  #[tokio::test]
  async fn ended_share_is_terminal() {
    let (_, gate) = setup();
    gate.start_share("tok", None).await.unwrap();
    let ended = gate.end_share("tok").await.unwrap();
    assert_eq!(ended.status, ShareStatus::Ended);
    assert!(ended.ended_at.is_some());

    assert!(matches!(
      gate.start_share("tok", None).await,
      Err(Error::Forbidden("share_ended"))
    ));
    assert!(matches!(
      gate.authorize(&guest("tok"), PingKind::Ordinary).await,
      Err(Error::Forbidden("invalid_share"))
    ));
  }

  #[tokio::test]
  async fn gate_requires_guest_flag_and_token() {
    let (_, gate) = setup();
    gate.start_share("tok", None).await.unwrap();

    let no_flag = GuestCredentials { is_guest: false, share_token: Some("tok".into()) };
    let no_token = GuestCredentials { is_guest: true, share_token: None };
    for creds in [no_flag, no_token] {
      assert!(matches!(
        gate.authorize(&creds, PingKind::Ordinary).await,
        Err(Error::Forbidden("share_required"))
      ));
    }
    assert!(matches!(
      gate.authorize(&guest("unknown"), PingKind::Ordinary).await,
      Err(Error::Forbidden("invalid_share"))
    ));
  }

  #[tokio::test]
  async fn blocked_share_is_rejected_but_still_live() {
    let (_, gate) = setup();
    gate.start_share("tok", None).await.unwrap();
    let blocked = gate.block("tok").await.unwrap();
    assert!(blocked.blocked);
    assert_eq!(blocked.status, ShareStatus::Live);

    assert!(matches!(
      gate.authorize(&guest("tok"), PingKind::Ordinary).await,
      Err(Error::Forbidden("share_blocked"))
    ));

    let restarted = gate.start_share("tok", None).await.unwrap();
    assert!(!restarted.blocked);
    assert_eq!(restarted.status, ShareStatus::Live);
    gate.authorize(&guest("tok"), PingKind::Ordinary).await.unwrap();
  }

  #[tokio::test]
  async fn padded_token_matches_trimmed_registration() {
    let (_, gate) = setup();
    let s = gate.start_share(" tok ", None).await.unwrap();
    assert_eq!(s.token, "tok");

    gate.authorize(&guest(" tok "), PingKind::Ordinary).await.unwrap();
    // Same rate key as the bare token.
    assert!(matches!(
      gate.authorize(&guest("tok"), PingKind::Ordinary).await,
      Err(Error::RateLimited { .. })
    ));
  }

  #[tokio::test]
  async fn ending_a_share_drops_its_rate_marks() {
    let registry = Arc::new(InMemoryShareRegistry::new());
    let clock = Arc::new(ManualClock::new(
      Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    let gate = GuestShareGate::new(registry.clone(), clock, GuestLimits::default());

    gate.start_share("tok", None).await.unwrap();
    gate.authorize(&guest("tok"), PingKind::Ordinary).await.unwrap();
    gate.authorize(&guest("tok"), PingKind::Emergency).await.unwrap();
    assert_eq!(registry.mark_count(), 2);

    gate.end_share("tok").await.unwrap();
    assert_eq!(registry.mark_count(), 0);
  }

  #[tokio::test]
  async fn oversized_interval_saturates() {
    let (clock, gate) = setup();
    gate.start_share("tok", None).await.unwrap();
    let creds = guest("tok");

    gate.authorize_ping(&creds, PingKind::Ordinary, u64::MAX).await.unwrap();
    clock.advance(TimeDelta::days(365));
    assert!(matches!(
      gate.authorize_ping(&creds, PingKind::Ordinary, u64::MAX).await,
      Err(Error::RateLimited { .. })
    ));
  }

  #[test]
  fn interval_conversion_saturates() {
    assert_eq!(interval_from_secs(60), TimeDelta::seconds(60));
    assert_eq!(interval_from_secs(u64::MAX), TimeDelta::MAX);
  }

  #[tokio::test]
  async fn ordinary_pings_are_spaced_sixty_seconds() {
    let (clock, gate) = setup();
    gate.start_share("tok", None).await.unwrap();
    let creds = guest("tok");

    gate.authorize_ping(&creds, PingKind::Ordinary, 60).await.unwrap();

    clock.advance(TimeDelta::seconds(20));
    match gate.authorize_ping(&creds, PingKind::Ordinary, 60).await {
      Err(Error::RateLimited { wait_ms }) => assert_eq!(wait_ms, 40_000),
      other => panic!("expected rate limit, got {other:?}"),
    }

    clock.advance(TimeDelta::seconds(40));
    gate.authorize_ping(&creds, PingKind::Ordinary, 60).await.unwrap();
  }

  #[tokio::test]
  async fn rejected_ping_does_not_extend_the_window() {
    let (clock, gate) = setup();
    gate.start_share("tok", None).await.unwrap();
    let creds = guest("tok");

    gate.authorize(&creds, PingKind::Ordinary).await.unwrap();
    clock.advance(TimeDelta::seconds(59));
    assert!(gate.authorize(&creds, PingKind::Ordinary).await.is_err());
    clock.advance(TimeDelta::seconds(1));
    assert!(gate.authorize(&creds, PingKind::Ordinary).await.is_ok());
  }

  #[tokio::test]
  async fn emergency_and_ordinary_keys_are_independent() {
    let (clock, gate) = setup();
    gate.start_share("tok", None).await.unwrap();
    let creds = guest("tok");

    gate.authorize(&creds, PingKind::Ordinary).await.unwrap();
    gate.authorize(&creds, PingKind::Emergency).await.unwrap();

    clock.advance(TimeDelta::seconds(30));
    assert!(gate.authorize(&creds, PingKind::Emergency).await.is_ok());
    assert!(matches!(
      gate.authorize(&creds, PingKind::Ordinary).await,
      Err(Error::RateLimited { .. })
    ));
  }

  #[test]
  fn fingerprint_is_stable_and_short() {
    assert_eq!(token_fingerprint("abc"), token_fingerprint("abc"));
    assert_eq!(token_fingerprint("abc").len(), 12);
    assert_ne!(token_fingerprint("abc"), token_fingerprint("abd"));
  }
}

//! The client-side tracking state machine.
//!
//! Exactly one of `idle`, `active` or `emergency` holds at a time, and at
//! most one repeating timer is armed. Every mode or frequency change cancels
//! the current timer before arming a new one and bumps an epoch counter;
//! pings carry the epoch they were started under, so a ping that completes
//! after a change neither records state nor fails the loop closed.
//!
//! ```text
//!   idle ──start_active──▶ active ──start_emergency──▶ emergency
//!    ▲  ◀──stop_active───    │                           │
//!    │                       └──────────────┐            │
//!    └──────────────────stop_emergency──────┴────────────┘
//! ```
//!
//! `emergency` always wins: `start_active` and `stop_active` are no-ops
//! while it runs.

use std::{
  sync::{Arc, Weak},
  time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tether_core::{
  clock::Clock,
  model::{LocationFix, PresenceMode},
};
use tokio::{
  sync::watch,
  task::JoinHandle,
  time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{Error, Result, client::PingSink, location::LocationSource};

// ─── Frequency ───────────────────────────────────────────────────────────────

pub const MIN_FREQUENCY_SECS: u64 = 30;
pub const MAX_FREQUENCY_SECS: u64 = 300;
pub const FREQUENCY_STEP_SECS: u64 = 5;
pub const DEFAULT_FREQUENCY_SECS: u64 = 60;
/// Emergency cadence; not user-adjustable.
pub const EMERGENCY_FREQUENCY_SECS: u64 = 30;

/// Clamp to `[30, 300]` and round to the nearest 5 s step.
pub fn quantize_frequency(secs: u64) -> u64 {
  let clamped = secs.clamp(MIN_FREQUENCY_SECS, MAX_FREQUENCY_SECS);
  let half = FREQUENCY_STEP_SECS / 2;
  ((clamped + half) / FREQUENCY_STEP_SECS * FREQUENCY_STEP_SECS)
    .clamp(MIN_FREQUENCY_SECS, MAX_FREQUENCY_SECS)
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  #[default]
  Idle,
  Active,
  Emergency,
}

impl Mode {
  /// The presence mode pings are tagged with, if tracking.
  pub fn presence_mode(self) -> Option<PresenceMode> {
    match self {
      Self::Idle => None,
      Self::Active => Some(PresenceMode::Active),
      Self::Emergency => Some(PresenceMode::Emergency),
    }
  }
}

/// A snapshot of the tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
  pub mode:           Mode,
  /// The user-selected active cadence. Emergency ignores it.
  pub frequency_secs: u64,
  pub last_ping_at:   Option<DateTime<Utc>>,
  pub last_fix:       Option<LocationFix>,
  pub last_error:     Option<String>,
}

impl Default for TrackingState {
  fn default() -> Self {
    Self {
      mode:           Mode::Idle,
      frequency_secs: DEFAULT_FREQUENCY_SECS,
      last_ping_at:   None,
      last_fix:       None,
      last_error:     None,
    }
  }
}

impl TrackingState {
  /// The period the timer runs at in the current mode.
  pub fn interval(&self) -> Option<Duration> {
    match self.mode {
      Mode::Idle => None,
      Mode::Active => Some(Duration::from_secs(self.frequency_secs)),
      Mode::Emergency => Some(Duration::from_secs(EMERGENCY_FREQUENCY_SECS)),
    }
  }
}

struct Inner {
  state:   TrackingState,
  /// The single timer slot.
  timer:   Option<JoinHandle<()>>,
  epoch:   u64,
  mode_tx: watch::Sender<Mode>,
}

impl Default for Inner {
  fn default() -> Self {
    Self {
      state:   TrackingState::default(),
      timer:   None,
      epoch:   0,
      mode_tx: watch::Sender::new(Mode::Idle),
    }
  }
}

impl Inner {
  /// Cancel the timer, enter `mode`, and start a new epoch.
  fn enter(&mut self, mode: Mode) -> u64 {
    if let Some(timer) = self.timer.take() {
      timer.abort();
    }
    self.epoch += 1;
    self.state.mode = mode;
    self.mode_tx.send_replace(mode);
    self.epoch
  }
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

pub struct Tracker<L, P> {
  source: L,
  sink:   P,
  clock:  Arc<dyn Clock>,
  inner:  Mutex<Inner>,
}

impl<L: LocationSource, P: PingSink> Tracker<L, P> {
  pub fn new(source: L, sink: P, clock: Arc<dyn Clock>) -> Arc<Self> {
    Arc::new(Self { source, sink, clock, inner: Mutex::default() })
  }

  pub fn state(&self) -> TrackingState { self.inner.lock().state.clone() }

  pub fn mode(&self) -> Mode { self.inner.lock().state.mode }

  /// Observe mode changes, including the forced return to idle when the
  /// server rejects our identity.
  pub fn subscribe(&self) -> watch::Receiver<Mode> { self.inner.lock().mode_tx.subscribe() }

  /// Begin ordinary tracking: one immediate ping, then one every
  /// `frequency_secs`. Ignored while already active or in emergency.
  pub async fn start_active(self: &Arc<Self>) -> Result<()> {
    self.start(Mode::Active).await
  }

  /// Begin emergency tracking at the fixed 30 s cadence. Allowed from idle
  /// or active; idempotent while already in emergency.
  pub async fn start_emergency(self: &Arc<Self>) -> Result<()> {
    self.start(Mode::Emergency).await
  }

  pub fn stop_active(&self) { self.stop(Mode::Active) }

  pub fn stop_emergency(&self) { self.stop(Mode::Emergency) }

  /// Return to idle from whatever mode is running.
  pub fn stop_all(&self) {
    let mut inner = self.inner.lock();
    if inner.state.mode != Mode::Idle {
      inner.enter(Mode::Idle);
      info!("tracking stopped");
    }
  }

  /// Set the active cadence, quantised to `[30, 300]` in 5 s steps, and
  /// return the value applied. While active the timer is re-armed at the
  /// new period without an extra ping.
  pub fn set_frequency(self: &Arc<Self>, secs: u64) -> u64 {
    let secs = quantize_frequency(secs);
    let mut inner = self.inner.lock();
    inner.state.frequency_secs = secs;
    if inner.state.mode == Mode::Active {
      // Same mode, same epoch: a ping already in flight still counts.
      let epoch = inner.epoch;
      self.arm(&mut inner, epoch);
      debug!(secs, "active timer re-armed");
    }
    secs
  }

  async fn start(self: &Arc<Self>, target: Mode) -> Result<()> {
    if !self.may_enter(target) {
      return Ok(());
    }
    self.source.request_permission().await?;

    let epoch = {
      let mut inner = self.inner.lock();
      // The mode may have moved while permission was pending.
      if !may_enter(inner.state.mode, target) {
        return Ok(());
      }
      let epoch = inner.enter(target);
      self.arm(&mut inner, epoch);
      epoch
    };
    info!(mode = ?target, "tracking started");

    self.ping(epoch).await
  }

  fn may_enter(&self, target: Mode) -> bool { may_enter(self.mode(), target) }

  fn stop(&self, from: Mode) {
    let mut inner = self.inner.lock();
    if inner.state.mode == from {
      inner.enter(Mode::Idle);
      info!(mode = ?from, "tracking stopped");
    }
  }

  /// Arm the repeating timer for the current mode. The first tick is one
  /// period from now; each tick spawns its ping so a slow ping never delays
  /// the schedule.
  fn arm(self: &Arc<Self>, inner: &mut Inner, epoch: u64) {
    let Some(period) = inner.state.interval() else { return };
    if let Some(timer) = inner.timer.take() {
      timer.abort();
    }

    let weak: Weak<Self> = Arc::downgrade(self);
    inner.timer = Some(tokio::spawn(async move {
      let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
      ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        ticks.tick().await;
        let Some(tracker) = weak.upgrade() else { break };
        if tracker.inner.lock().epoch != epoch {
          break;
        }
        tokio::spawn(async move {
          // Fatal outcomes are already applied to the state.
          let _ = tracker.ping(epoch).await;
        });
      }
    }));
  }

  /// Take one fix and deliver it. Only [`Error::Unauthenticated`] is
  /// returned; it forces the tracker idle. Other failures are recorded in
  /// `last_error` and left for the next tick.
  async fn ping(&self, epoch: u64) -> Result<()> {
    let mode = {
      let inner = self.inner.lock();
      if inner.epoch != epoch {
        return Ok(());
      }
      match inner.state.mode.presence_mode() {
        Some(mode) => mode,
        None => return Ok(()),
      }
    };

    let outcome = async {
      let fix = self.source.current_fix().await?;
      self.sink.send_ping(fix, mode).await?;
      Ok::<_, Error>(fix)
    }
    .await;

    let mut inner = self.inner.lock();
    if inner.epoch != epoch {
      debug!("ignoring ping result from a previous mode");
      return Ok(());
    }
    match outcome {
      Ok(fix) => {
        inner.state.last_fix = Some(fix);
        inner.state.last_ping_at = Some(self.clock.now());
        inner.state.last_error = None;
        Ok(())
      }
      Err(e) if e.is_fatal() => {
        warn!(error = %e, "ping rejected; tracking stopped");
        inner.enter(Mode::Idle);
        inner.state.last_error = Some(e.to_string());
        Err(e)
      }
      Err(e) => {
        warn!(error = %e, "ping failed; retrying on next tick");
        inner.state.last_error = Some(e.to_string());
        Ok(())
      }
    }
  }
}

impl<L, P> Drop for Tracker<L, P> {
  fn drop(&mut self) {
    if let Some(timer) = self.inner.get_mut().timer.take() {
      timer.abort();
    }
  }
}

/// Whether a start request for `target` applies in `current`.
fn may_enter(current: Mode, target: Mode) -> bool {
  match target {
    Mode::Active => current == Mode::Idle,
    Mode::Emergency => current != Mode::Emergency,
    Mode::Idle => false,
  }
}

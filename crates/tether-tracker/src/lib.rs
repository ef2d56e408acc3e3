//! Client-side tracking for Tether.
//!
//! [`Tracker`] is the mode/frequency state machine that turns device fixes
//! from a [`LocationSource`] into pings delivered through a [`PingSink`]
//! (normally the HTTP [`ApiClient`]).

pub mod client;
pub mod error;
pub mod location;
pub mod settings;
pub mod tracker;

pub use client::{ApiClient, ApiConfig, Credentials, PingSink};
pub use error::{Error, Result};
pub use location::{FileLocation, LocationSource, StaticLocation};
pub use tracker::{Mode, Tracker, TrackingState};

//! Core types and services for Tether, the time-limited live location share.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the trust graph, the visibility ACL, the expiring presence store, the live
//! visibility join and the guest share gate, all expressed over the
//! [`store::TetherStore`] and [`share::ShareRegistry`] abstractions.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod error;
pub mod identity;
pub mod live;
pub mod model;
pub mod presence;
pub mod share;
pub mod store;
pub mod trust;
pub mod visibility;

pub use error::{Error, InvalidTarget, Result};
pub use model::UserId;

//! SQLite backend for the Tether store and share registry.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod shares;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

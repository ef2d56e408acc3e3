//! Server configuration.
//!
//! Loaded from an optional TOML file overlaid by `TETHER_`-prefixed
//! environment variables (nested keys use `__`, e.g.
//! `TETHER_GUEST__ORDINARY_MIN_INTERVAL_SECS=90`).

use std::path::{Path, PathBuf};

use config::{Config, ConfigBuilder, Environment as EnvSource, File, builder::DefaultState};
use serde::Deserialize;
use tether_core::{UserId, share::GuestLimits};

use crate::{Error, Result};

/// Longest accepted guest ping interval, one day.
pub const MAX_GUEST_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
  #[default]
  Development,
  Production,
}

/// Where guest share sessions and rate-limit marks live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareBackend {
  /// Process-local; correct only for a single server instance.
  #[default]
  Memory,
  /// The same SQLite file as the main store.
  Sqlite,
}

/// A user known to this server.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
  pub user_id:      UserId,
  pub email:        String,
  #[serde(default)]
  pub display_name: Option<String>,
  /// Argon2 PHC string for the user's token secret.
  pub token_hash:   String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:          String,
  #[serde(default = "default_port")]
  pub port:          u16,
  #[serde(default = "default_store_path")]
  pub store_path:    PathBuf,
  #[serde(default)]
  pub environment:   Environment,
  #[serde(default = "default_require_auth")]
  pub require_auth:  bool,
  #[serde(default)]
  pub share_backend: ShareBackend,
  #[serde(default)]
  pub guest:         GuestLimits,
  #[serde(default)]
  pub users:         Vec<UserEntry>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 3000 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/tether/tether.db") }
fn default_require_auth() -> bool { true }

impl ServerConfig {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> Result<Self> {
    Self::from_builder(
      Config::builder().add_source(File::from(path.to_path_buf()).required(false)),
    )
  }

  pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
    let cfg: ServerConfig = builder
      .add_source(
        EnvSource::with_prefix("TETHER")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  /// The dev auth bypass must never be reachable in production.
  pub fn validate(&self) -> Result<()> {
    if !self.require_auth && self.environment == Environment::Production {
      return Err(Error::DevAuthInProduction);
    }
    for secs in [
      self.guest.ordinary_min_interval_secs,
      self.guest.emergency_min_interval_secs,
    ] {
      if secs > MAX_GUEST_INTERVAL_SECS {
        return Err(Error::GuestInterval(secs));
      }
    }
    Ok(())
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::FileFormat;

  use super::*;

  fn parse(toml: &str) -> Result<ServerConfig> {
    ServerConfig::from_builder(
      Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
    )
  }

  #[test]
  fn defaults_apply_to_empty_file() {
    let cfg = parse("").unwrap();
    assert_eq!(cfg.port, 3000);
    assert!(cfg.require_auth);
    assert_eq!(cfg.environment, Environment::Development);
    assert_eq!(cfg.share_backend, ShareBackend::Memory);
    assert_eq!(cfg.guest, GuestLimits::default());
    assert!(cfg.users.is_empty());
  }

  #[test]
  fn full_file_parses() {
    let cfg = parse(
      r#"
        host = "0.0.0.0"
        port = 8080
        store_path = "/var/lib/tether.db"
        environment = "production"
        share_backend = "sqlite"

        [guest]
        ordinary_min_interval_secs = 90

        [[users]]
        user_id = "6f1f3c1e-8a3b-4c5d-9e7f-0a1b2c3d4e5f"
        email = "alice@example.com"
        display_name = "Alice"
        token_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.address(), "0.0.0.0:8080");
    assert_eq!(cfg.share_backend, ShareBackend::Sqlite);
    assert_eq!(cfg.guest.ordinary_min_interval_secs, 90);
    assert_eq!(cfg.guest.emergency_min_interval_secs, 30);
    assert_eq!(cfg.users[0].display_name.as_deref(), Some("Alice"));
  }

  #[test]
  fn dev_auth_rejected_in_production() {
    let err = parse("environment = \"production\"\nrequire_auth = false").unwrap_err();
    assert!(matches!(err, Error::DevAuthInProduction));
    assert!(parse("require_auth = false").is_ok());
  }

  #[test]
  fn guest_interval_is_bounded() {
    let err = parse("[guest]\nemergency_min_interval_secs = 99999999999999999").unwrap_err();
    assert!(matches!(err, Error::GuestInterval(99_999_999_999_999_999)));
    assert!(parse("[guest]\nordinary_min_interval_secs = 86400").is_ok());
  }

  #[test]
  fn tilde_expands_to_home() {
    let home = std::env::var("HOME").unwrap_or_default();
    let expanded = expand_tilde(Path::new("~/tether.db"));
    if !home.is_empty() {
      assert_eq!(expanded, PathBuf::from(home).join("tether.db"));
    }
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}

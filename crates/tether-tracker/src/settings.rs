//! Optional TOML config file for the tracker CLI. Command-line flags
//! override every field.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Shape of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TrackerFile {
  pub server:         Option<String>,
  pub token:          Option<String>,
  pub share_token:    Option<String>,
  pub share_reason:   Option<String>,
  pub frequency_secs: Option<u64>,
  pub fix_file:       Option<PathBuf>,
  pub lat:            Option<f64>,
  pub lng:            Option<f64>,
  pub accuracy_m:     Option<f64>,
}

impl TrackerFile {
  pub fn read(path: &Path) -> anyhow::Result<Self> {
    use anyhow::Context as _;
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")
  }
}

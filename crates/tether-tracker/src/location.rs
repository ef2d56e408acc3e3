//! Where fixes come from.

use std::{future::Future, path::PathBuf};

use tether_core::model::LocationFix;

use crate::{Error, Result};

/// The device's positioning capability.
pub trait LocationSource: Send + Sync + 'static {
  /// Ask for permission to read the location. Fails with
  /// [`Error::PermissionDenied`] if it is refused.
  fn request_permission(&self) -> impl Future<Output = Result<()>> + Send + '_;

  /// Obtain one fix.
  fn current_fix(&self) -> impl Future<Output = Result<LocationFix>> + Send + '_;
}

/// Always reports the same coordinates.
#[derive(Debug, Clone, Copy)]
pub struct StaticLocation(pub LocationFix);

impl LocationSource for StaticLocation {
  async fn request_permission(&self) -> Result<()> { Ok(()) }

  async fn current_fix(&self) -> Result<LocationFix> {
    self.0.validate().map_err(|e| Error::Location(e.to_string()))?;
    Ok(self.0)
  }
}

/// Reads the newest fix from a JSON file (`{"lat":..,"lng":..,"accuracyM":..}`)
/// on every ping, so another process can feed positions in.
#[derive(Debug, Clone)]
pub struct FileLocation {
  path: PathBuf,
}

impl FileLocation {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl LocationSource for FileLocation {
  async fn request_permission(&self) -> Result<()> {
    tokio::fs::metadata(&self.path)
      .await
      .map(|_| ())
      .map_err(|e| Error::PermissionDenied(format!("{}: {e}", self.path.display())))
  }

  async fn current_fix(&self) -> Result<LocationFix> {
    let raw = tokio::fs::read_to_string(&self.path)
      .await
      .map_err(|e| Error::Location(format!("{}: {e}", self.path.display())))?;
    let fix: LocationFix =
      serde_json::from_str(&raw).map_err(|e| Error::Location(e.to_string()))?;
    fix.validate().map_err(|e| Error::Location(e.to_string()))?;
    Ok(fix)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tether-{name}-{}.json", std::process::id()))
  }

  #[tokio::test]
  async fn file_source_reads_latest_fix() {
    let path = scratch("fix");
    tokio::fs::write(&path, r#"{"lat": 10.5, "lng": -3.25, "accuracyM": 4}"#)
      .await
      .unwrap();
    let source = FileLocation::new(&path);

    source.request_permission().await.unwrap();
    let fix = source.current_fix().await.unwrap();
    assert_eq!(fix, LocationFix::new(10.5, -3.25, Some(4.0)));

    tokio::fs::write(&path, r#"{"lat": 200, "lng": 0}"#).await.unwrap();
    assert!(matches!(source.current_fix().await, Err(Error::Location(_))));

    tokio::fs::remove_file(&path).await.unwrap();
  }

  #[tokio::test]
  async fn missing_file_denies_permission() {
    let source = FileLocation::new(scratch("absent"));
    assert!(matches!(
      source.request_permission().await,
      Err(Error::PermissionDenied(_))
    ));
  }
}

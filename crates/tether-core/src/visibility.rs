//! Per-(owner, viewer) visibility grants, gated by accepted trust.
//!
//! A grant may only be written while `owner → viewer` is accepted. Grants are
//! not deleted when trust is later revoked; readers re-check trust at read
//! time instead (see [`crate::live`]).

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::{
  Error, Result,
  clock::Clock,
  model::{UserId, VisibilityGrant},
  store::{GrantFilter, TetherStore},
  trust::TrustGraph,
};

/// Parse a `canView` payload strictly: only a JSON boolean is accepted.
///
/// `"true"`, `1` and friends are rejected rather than coerced.
pub fn parse_can_view(value: Option<&Value>) -> Result<bool> {
  match value {
    Some(Value::Bool(b)) => Ok(*b),
    Some(_) => Err(Error::invalid("canView must be a boolean")),
    None => Err(Error::invalid("canView is required")),
  }
}

pub struct VisibilityAcl<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: TetherStore> VisibilityAcl<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Let (or stop letting) `viewer_id` see `owner_id`.
  ///
  /// Fails with `Forbidden("not_trusted")` unless `owner → viewer` is
  /// accepted, whatever the previous grant state was.
  pub async fn set_grant(
    &self,
    owner_id: UserId,
    viewer_id: UserId,
    can_view: bool,
  ) -> Result<VisibilityGrant> {
    if owner_id == viewer_id {
      return Err(Error::invalid("viewerUserId cannot be self"));
    }

    let trusted = TrustGraph::new(self.store.clone(), self.clock.clone())
      .is_accepted(owner_id, viewer_id)
      .await?;
    if !trusted {
      return Err(Error::Forbidden("not_trusted"));
    }

    let grant = self
      .store
      .upsert_grant(VisibilityGrant {
        owner_id,
        viewer_id,
        can_view,
        updated_at: self.clock.now(),
      })
      .await
      .map_err(Error::store)?;

    info!(%owner_id, %viewer_id, can_view, "visibility updated");
    Ok(grant)
  }

  /// Existing grants from `owner_id` to any of `viewer_ids`. Viewers without
  /// a row are absent, which callers treat as `can_view = false`.
  pub async fn grants_by_owner(
    &self,
    owner_id: UserId,
    viewer_ids: Vec<UserId>,
  ) -> Result<Vec<VisibilityGrant>> {
    if viewer_ids.is_empty() {
      return Ok(Vec::new());
    }
    self
      .store
      .list_grants(GrantFilter {
        owner_id: Some(owner_id),
        viewer_in: Some(viewer_ids),
        ..Default::default()
      })
      .await
      .map_err(Error::store)
  }

  /// Which of `owner_ids` currently let `viewer_id` see them.
  pub async fn owners_granting(
    &self,
    viewer_id: UserId,
    owner_ids: Vec<UserId>,
  ) -> Result<Vec<UserId>> {
    if owner_ids.is_empty() {
      return Ok(Vec::new());
    }
    Ok(
      self
        .store
        .list_grants(GrantFilter {
          viewer_id: Some(viewer_id),
          owner_in: Some(owner_ids),
          can_view: Some(true),
          ..Default::default()
        })
        .await
        .map_err(Error::store)?
        .into_iter()
        .map(|g| g.owner_id)
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn can_view_accepts_only_json_booleans() {
    assert!(parse_can_view(Some(&json!(true))).unwrap());
    assert!(!parse_can_view(Some(&json!(false))).unwrap());

    for loose in [json!("true"), json!("false"), json!(1), json!(0), json!(null)] {
      assert!(
        matches!(parse_can_view(Some(&loose)), Err(Error::InvalidArgument(_))),
        "accepted {loose}"
      );
    }
    assert!(matches!(parse_can_view(None), Err(Error::InvalidArgument(_))));
  }
}

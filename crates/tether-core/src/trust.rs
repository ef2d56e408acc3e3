//! The trust graph and its reciprocal-acceptance protocol.
//!
//! Edges are directed, but acceptance always writes the reciprocal edge too,
//! so for every accepted `a → b` there is an accepted `b → a`.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, InvalidTarget, Result,
  clock::Clock,
  model::{TrustEdge, TrustStatus, UserId},
  store::{EdgeFilter, TetherStore},
  visibility::VisibilityAcl,
};

/// Result of [`TrustGraph::request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
  /// A pending `requester → target` edge now exists.
  Pending(TrustEdge),
  /// The target had already asked the requester; their edge was accepted and
  /// the reciprocal edge written as accepted.
  AutoAccepted {
    accepted:   TrustEdge,
    reciprocal: TrustEdge,
  },
  /// `requester → target` was already accepted and is left untouched.
  AlreadyTrusted(TrustEdge),
}

/// An accepted contact as shown in the owner's contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedContact {
  pub user_id:       UserId,
  pub email:         String,
  pub display_name:  Option<String>,
  /// Whether the list owner currently lets this contact see them.
  pub share_enabled: bool,
}

pub struct TrustGraph<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: TetherStore> TrustGraph<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Ask `target_id` for trust.
  ///
  /// If `target_id` already has a pending request towards `requester_id`,
  /// that request is accepted on the spot instead of opening a second one.
  /// Only a `pending` inbound edge triggers this; a `denied` one does not.
  pub async fn request(
    &self,
    requester_id: UserId,
    target_id: UserId,
  ) -> Result<RequestOutcome> {
    if requester_id == target_id {
      return Err(Error::InvalidTarget(InvalidTarget::SelfTarget));
    }

    let target = self
      .store
      .get_profile(target_id)
      .await
      .map_err(Error::store)?;
    if target.is_none() {
      return Err(Error::InvalidTarget(InvalidTarget::UnknownUser));
    }

    let now = self.clock.now();

    if let Some(inbound) = self
      .store
      .find_edge(target_id, requester_id)
      .await
      .map_err(Error::store)?
      && inbound.status == TrustStatus::Pending
    {
      let accepted = self
        .store
        .update_edge_status(inbound.id, TrustStatus::Accepted, now)
        .await
        .map_err(Error::store)?
        .ok_or(Error::NotFound("trust request"))?;
      let reciprocal = self
        .store
        .upsert_edge(requester_id, target_id, TrustStatus::Accepted, now)
        .await
        .map_err(Error::store)?;

      info!(%requester_id, %target_id, "mutual trust request auto-accepted");
      return Ok(RequestOutcome::AutoAccepted { accepted, reciprocal });
    }

    if let Some(existing) = self
      .store
      .find_edge(requester_id, target_id)
      .await
      .map_err(Error::store)?
      && existing.status == TrustStatus::Accepted
    {
      debug!(%requester_id, %target_id, "trust already accepted");
      return Ok(RequestOutcome::AlreadyTrusted(existing));
    }

    let edge = self
      .store
      .upsert_edge(requester_id, target_id, TrustStatus::Pending, now)
      .await
      .map_err(Error::store)?;

    debug!(%requester_id, %target_id, edge_id = %edge.id, "trust requested");
    Ok(RequestOutcome::Pending(edge))
  }

  /// Accept an edge addressed to `acting_user_id` and write the reciprocal.
  pub async fn accept(
    &self,
    edge_id: Uuid,
    acting_user_id: UserId,
  ) -> Result<TrustEdge> {
    let edge = self.addressed_edge(edge_id, acting_user_id).await?;
    let now  = self.clock.now();

    let accepted = self
      .store
      .update_edge_status(edge.id, TrustStatus::Accepted, now)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("trust request"))?;

    self
      .store
      .upsert_edge(acting_user_id, edge.requester_id, TrustStatus::Accepted, now)
      .await
      .map_err(Error::store)?;

    info!(%edge_id, requester_id = %edge.requester_id, "trust request accepted");
    Ok(accepted)
  }

  /// Deny an edge addressed to `acting_user_id`. The reciprocal edge is not
  /// touched, so an edge that is already accepted cannot be denied (that
  /// would leave its accepted reciprocal dangling).
  pub async fn deny(
    &self,
    edge_id: Uuid,
    acting_user_id: UserId,
  ) -> Result<TrustEdge> {
    let edge = self.addressed_edge(edge_id, acting_user_id).await?;
    if edge.status == TrustStatus::Accepted {
      return Err(Error::Forbidden("already_accepted"));
    }

    let denied = self
      .store
      .update_edge_status(edge.id, TrustStatus::Denied, self.clock.now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("trust request"))?;

    info!(%edge_id, requester_id = %edge.requester_id, "trust request denied");
    Ok(denied)
  }

  /// Pending requests addressed to `user_id`, newest first.
  pub async fn list_incoming(&self, user_id: UserId) -> Result<Vec<TrustEdge>> {
    self
      .store
      .list_edges(EdgeFilter {
        requested_id: Some(user_id),
        status: Some(TrustStatus::Pending),
        ..Default::default()
      })
      .await
      .map_err(Error::store)
  }

  /// The accepted contacts of `user_id`, with their profiles and whether
  /// `user_id` currently shares with them.
  ///
  /// Contacts without a resolvable profile email are dropped rather than
  /// returned as blank rows. Sorted by display name, then email.
  pub async fn list_accepted(&self, user_id: UserId) -> Result<Vec<TrustedContact>> {
    let contact_ids: Vec<UserId> = self
      .store
      .list_edges(EdgeFilter {
        requester_id: Some(user_id),
        status: Some(TrustStatus::Accepted),
        ..Default::default()
      })
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|e| e.requested_id)
      .collect();

    if contact_ids.is_empty() {
      return Ok(Vec::new());
    }

    let profiles: HashMap<UserId, _> = self
      .store
      .get_profiles(contact_ids.clone())
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|p| (p.user_id, p))
      .collect();

    let sharing: HashMap<UserId, bool> =
      VisibilityAcl::new(self.store.clone(), self.clock.clone())
        .grants_by_owner(user_id, contact_ids.clone())
        .await?
        .into_iter()
        .map(|g| (g.viewer_id, g.can_view))
        .collect();

    let mut contacts: Vec<TrustedContact> = contact_ids
      .into_iter()
      .filter_map(|id| {
        let profile = profiles.get(&id)?;
        let email   = profile.email.clone()?;
        Some(TrustedContact {
          user_id: id,
          email,
          display_name: profile.display_name.clone(),
          share_enabled: sharing.get(&id).copied().unwrap_or(false),
        })
      })
      .collect();

    contacts.sort_by(compare_contacts);
    Ok(contacts)
  }

  /// Whether `from → to` is currently accepted.
  pub async fn is_accepted(&self, from: UserId, to: UserId) -> Result<bool> {
    Ok(
      self
        .store
        .find_edge(from, to)
        .await
        .map_err(Error::store)?
        .is_some_and(|e| e.status == TrustStatus::Accepted),
    )
  }

  async fn addressed_edge(
    &self,
    edge_id: Uuid,
    acting_user_id: UserId,
  ) -> Result<TrustEdge> {
    let edge = self
      .store
      .get_edge(edge_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound("trust request"))?;
    if edge.requested_id != acting_user_id {
      return Err(Error::Forbidden("not_addressee"));
    }
    Ok(edge)
  }
}

/// Named contacts first (case-insensitive), then by email.
fn compare_contacts(a: &TrustedContact, b: &TrustedContact) -> Ordering {
  let an = a.display_name.as_deref().unwrap_or("").to_lowercase();
  let bn = b.display_name.as_deref().unwrap_or("").to_lowercase();
  match (an.is_empty(), bn.is_empty()) {
    (false, false) if an != bn => return an.cmp(&bn),
    (false, true) => return Ordering::Less,
    (true, false) => return Ordering::Greater,
    _ => {}
  }
  a.email.to_lowercase().cmp(&b.email.to_lowercase())
}

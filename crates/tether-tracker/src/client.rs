//! Async HTTP client for the Tether ping and share endpoints.

use std::{future::Future, time::Duration};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tether_core::model::{LocationFix, PresenceMode};
use tracing::debug;

use crate::{Error, Result};

/// Where pings go.
pub trait PingSink: Send + Sync + 'static {
  /// Deliver one fix. `Emergency` pings go to the emergency endpoint.
  fn send_ping(
    &self,
    fix: LocationFix,
    mode: PresenceMode,
  ) -> impl Future<Output = Result<()>> + Send + '_;
}

/// How the client identifies itself.
#[derive(Debug, Clone)]
pub enum Credentials {
  /// A user token, sent as `Authorization: Bearer`.
  Bearer(String),
  /// No identity; pings ride on a guest share token.
  Guest { share_token: String },
}

/// Connection settings for the Tether API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url:    String,
  pub credentials: Credentials,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PingPayload<'a> {
  #[serde(flatten)]
  fix:         LocationFix,
  #[serde(skip_serializing_if = "Option::is_none")]
  is_guest:    Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  share_token: Option<&'a str>,
}

#[derive(Serialize)]
struct SharePayload<'a> {
  token:  &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  reason: Option<&'a str>,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.credentials {
      Credentials::Bearer(token) => req.bearer_auth(token),
      Credentials::Guest { .. } => req,
    }
  }

  fn share_token(&self) -> Option<&str> {
    match &self.config.credentials {
      Credentials::Guest { share_token } => Some(share_token),
      Credentials::Bearer(_) => None,
    }
  }

  /// `POST /api/shares/start` for the configured guest share. A no-op for
  /// bearer credentials.
  pub async fn start_share(&self, reason: Option<&str>) -> Result<()> {
    let Some(token) = self.share_token() else { return Ok(()) };
    let resp = self
      .client
      .post(self.url("/shares/start"))
      .json(&SharePayload { token, reason })
      .send()
      .await?;
    check(resp).await
  }

  /// `POST /api/shares/end` for the configured guest share.
  pub async fn end_share(&self) -> Result<()> {
    let Some(token) = self.share_token() else { return Ok(()) };
    let resp = self
      .client
      .post(self.url("/shares/end"))
      .json(&SharePayload { token, reason: None })
      .send()
      .await?;
    check(resp).await
  }
}

impl PingSink for ApiClient {
  async fn send_ping(&self, fix: LocationFix, mode: PresenceMode) -> Result<()> {
    let path = match mode {
      PresenceMode::Active => "/locations",
      PresenceMode::Emergency => "/emergency",
    };
    let share_token = self.share_token();
    let payload = PingPayload {
      fix,
      is_guest: share_token.map(|_| true),
      share_token,
    };

    let resp = self
      .auth(self.client.post(self.url(path)))
      .json(&payload)
      .send()
      .await?;
    check(resp).await?;
    debug!(path, "ping delivered");
    Ok(())
  }
}

/// Map a response status onto the tracker's error taxonomy.
async fn check(resp: Response) -> Result<()> {
  let status = resp.status();
  if status.is_success() {
    return Ok(());
  }
  if status == StatusCode::UNAUTHORIZED {
    return Err(Error::Unauthenticated);
  }
  let code = resp
    .json::<Value>()
    .await
    .ok()
    .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
    .unwrap_or_else(|| status.to_string());
  Err(Error::Rejected { status: status.as_u16(), code })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn guest_payload_carries_share_fields() {
    let payload = PingPayload {
      fix:         LocationFix::new(1.0, 2.0, None),
      is_guest:    Some(true),
      share_token: Some("tok"),
    };
    assert_eq!(
      serde_json::to_value(&payload).unwrap(),
      json!({ "lat": 1.0, "lng": 2.0, "accuracyM": null, "isGuest": true, "shareToken": "tok" })
    );
  }

  #[test]
  fn urls_are_rooted_under_api() {
    let client = ApiClient::new(ApiConfig {
      base_url:    "http://localhost:3000/".into(),
      credentials: Credentials::Bearer("t".into()),
    })
    .unwrap();
    assert_eq!(client.url("/locations"), "http://localhost:3000/api/locations");
    assert_eq!(client.share_token(), None);
  }
}

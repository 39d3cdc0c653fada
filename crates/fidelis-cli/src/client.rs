//! Async HTTP client wrapping the Fidelis JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use fidelis_core::{
  balance::Reconciliation,
  entry::LedgerEntry,
  ledger::OrderTransition,
  order::OrderUpdate,
  page::Pagination,
  user::User,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use uuid::Uuid;

/// Connection settings for the Fidelis API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct MembersPage {
  pub members:    Vec<User>,
  pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct HistoryPage {
  pub user:       User,
  pub history:    Vec<LedgerEntry>,
  pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct EntryCreated {
  pub entry:   LedgerEntry,
  pub balance: i64,
}

/// Optional paging parameters, forwarded verbatim as query-string values.
#[derive(Debug, Default, Serialize)]
pub struct Paging {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page:     Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit:    Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub snapshot: Option<i64>,
}

/// Async HTTP client for the Fidelis JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.email.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.email, Some(&self.config.password))
    }
  }

  /// Send `req` and decode a successful JSON body, surfacing the server's
  /// `{"error": ...}` message otherwise.
  async fn send<T: DeserializeOwned>(&self, what: &str, req: RequestBuilder) -> Result<T> {
    tracing::debug!(request = what, "sending");
    let resp = self
      .auth(req)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    decode(what, resp).await
  }

  // ── Account ───────────────────────────────────────────────────────────────

  /// `GET /api/me`
  pub async fn me(&self) -> Result<User> {
    self.send("GET /me", self.client.get(self.url("/me"))).await
  }

  // ── Points ────────────────────────────────────────────────────────────────

  /// `GET /api/fidelity-points[?search=&page=&limit=]`
  pub async fn members(&self, search: Option<&str>, paging: &Paging) -> Result<MembersPage> {
    let mut req = self.client.get(self.url("/fidelity-points")).query(paging);
    if let Some(s) = search {
      req = req.query(&[("search", s)]);
    }
    self.send("GET /fidelity-points", req).await
  }

  /// `GET /api/fidelity-points/{userId}`
  pub async fn history(&self, user_id: Uuid, paging: &Paging) -> Result<HistoryPage> {
    let req = self
      .client
      .get(self.url(&format!("/fidelity-points/{user_id}")))
      .query(paging);
    self.send("GET /fidelity-points/{userId}", req).await
  }

  /// `POST /api/fidelity-points`
  pub async fn adjust(
    &self,
    user_id: Uuid,
    points: i64,
    description: &str,
    reference: Option<&str>,
  ) -> Result<EntryCreated> {
    let body = json!({
      "userId": user_id,
      "points": points,
      "description": description,
      "reference": reference,
    });
    let req = self.client.post(self.url("/fidelity-points")).json(&body);
    self.send("POST /fidelity-points", req).await
  }

  /// `POST /api/fidelity-points/{userId}/redeem`
  pub async fn redeem(
    &self,
    user_id: Uuid,
    points: i64,
    reference: Option<&str>,
  ) -> Result<EntryCreated> {
    let body = json!({ "points": points, "reference": reference });
    let req = self
      .client
      .post(self.url(&format!("/fidelity-points/{user_id}/redeem")))
      .json(&body);
    self.send("POST /fidelity-points/{userId}/redeem", req).await
  }

  // ── Integrity ─────────────────────────────────────────────────────────────

  /// `GET /api/fidelity-points/{userId}/reconcile`
  pub async fn reconcile(&self, user_id: Uuid) -> Result<Reconciliation> {
    let req = self
      .client
      .get(self.url(&format!("/fidelity-points/{user_id}/reconcile")));
    self.send("GET /fidelity-points/{userId}/reconcile", req).await
  }

  /// `POST /api/fidelity-points/{userId}/repair`
  pub async fn repair(&self, user_id: Uuid) -> Result<Reconciliation> {
    let req = self
      .client
      .post(self.url(&format!("/fidelity-points/{user_id}/repair")));
    self.send("POST /fidelity-points/{userId}/repair", req).await
  }

  /// `GET /api/fidelity-points/drift`
  pub async fn drift(&self) -> Result<Vec<Reconciliation>> {
    let req = self.client.get(self.url("/fidelity-points/drift"));
    self.send("GET /fidelity-points/drift", req).await
  }

  // ── Orders ────────────────────────────────────────────────────────────────

  /// `PATCH /api/orders/{orderId}`
  pub async fn update_order(&self, order_id: Uuid, update: OrderUpdate) -> Result<OrderTransition> {
    let req = self
      .client
      .patch(self.url(&format!("/orders/{order_id}")))
      .json(&update);
    self.send("PATCH /orders/{orderId}", req).await
  }

  /// `POST /api/orders/{orderId}/accrue`
  pub async fn accrue(&self, order_id: Uuid) -> Result<LedgerEntry> {
    let req = self
      .client
      .post(self.url(&format!("/orders/{order_id}/accrue")));
    self.send("POST /orders/{orderId}/accrue", req).await
  }
}

async fn decode<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T> {
  let status = resp.status();
  if status.is_success() {
    return resp
      .json()
      .await
      .with_context(|| format!("deserialising {what} response"));
  }

  let message = resp
    .json::<serde_json::Value>()
    .await
    .ok()
    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
    .unwrap_or_default();
  if message.is_empty() {
    Err(anyhow!("{what} → {status}"))
  } else {
    Err(anyhow!("{what} → {status}: {message}"))
  }
}

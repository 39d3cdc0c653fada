//! Handlers for `/fidelity-points` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/fidelity-points` | Staff. `?search=&page=&limit=` |
//! | `POST` | `/fidelity-points` | Staff. Body: `{"userId","points","description","reference"?}` |
//! | `GET`  | `/fidelity-points/drift` | Staff. Users whose cached balance disagrees with the ledger |
//! | `GET`  | `/fidelity-points/{userId}` | Self or staff. `?page=&limit=&snapshot=` |
//! | `POST` | `/fidelity-points/{userId}/redeem` | Self or staff. Body: `{"points","reference"?}` |
//! | `GET`  | `/fidelity-points/{userId}/reconcile` | Staff |
//! | `POST` | `/fidelity-points/{userId}/repair` | Admin |

use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use fidelis_core::{
  adjustment::{Adjustment, Redemption},
  balance::Reconciliation,
  entry::LedgerEntry,
  page::{DEFAULT_CUSTOMER_LIMIT, DEFAULT_STAFF_LIMIT, PageRequest, Pagination},
  store::{LedgerStore, MemberQuery},
  user::User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{Json, Path},
};

// ─── Views ────────────────────────────────────────────────────────────────────

/// A ledger entry as shown to clients, with its human-readable type label.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
  #[serde(flatten)]
  pub entry:      LedgerEntry,
  pub type_label: &'static str,
}

impl From<LedgerEntry> for EntryView {
  fn from(entry: LedgerEntry) -> Self {
    let type_label = entry.entry_type.label();
    Self { entry, type_label }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationView {
  #[serde(flatten)]
  pub reconciliation: Reconciliation,
  pub drift:          i64,
}

impl From<Reconciliation> for ReconciliationView {
  fn from(reconciliation: Reconciliation) -> Self {
    Self { drift: reconciliation.drift(), reconciliation }
  }
}

/// Result of a write: the new entry and the balance it left behind.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryCreated {
  pub entry:   EntryView,
  pub balance: i64,
}

// ─── Members ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MemberParams {
  pub search: Option<String>,
  pub page:   Option<String>,
  pub limit:  Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
  pub members:    Vec<User>,
  pub pagination: Pagination,
}

/// `GET /fidelity-points[?search=&page=&limit=]`
pub async fn list<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Query(params): Query<MemberParams>,
) -> Result<Json<MembersResponse>, ApiError> {
  let caller = auth.caller();
  let page = PageRequest::from_params(
    params.page.as_deref(),
    params.limit.as_deref(),
    None,
    DEFAULT_STAFF_LIMIT,
  )
  .map_err(|e| ApiError::rule(&e, &caller))?;
  let query = MemberQuery {
    search: params.search.filter(|s| !s.trim().is_empty()),
    page,
  };

  let members = state
    .ledger
    .members(&caller, &query)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok(Json(MembersResponse {
    members:    members.items,
    pagination: members.pagination,
  }))
}

// ─── Adjust ───────────────────────────────────────────────────────────────────

/// `POST /fidelity-points`
pub async fn adjust<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Json(body): Json<Adjustment>,
) -> Result<impl IntoResponse, ApiError> {
  let caller = auth.caller();
  let user_id = body.user_id;
  let entry = state
    .ledger
    .adjust(&caller, body)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  let balance = state
    .ledger
    .balance(&caller, user_id)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok((StatusCode::CREATED, Json(EntryCreated { entry: entry.into(), balance })))
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub page:     Option<String>,
  pub limit:    Option<String>,
  pub snapshot: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
  pub user:       User,
  pub history:    Vec<EntryView>,
  pub pagination: Pagination,
}

/// `GET /fidelity-points/{userId}[?page=&limit=&snapshot=]`
pub async fn history<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(user_id): Path<Uuid>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
  let caller = auth.caller();
  let default_limit = if caller.is_staff() {
    DEFAULT_STAFF_LIMIT
  } else {
    DEFAULT_CUSTOMER_LIMIT
  };
  let page = PageRequest::from_params(
    params.page.as_deref(),
    params.limit.as_deref(),
    params.snapshot.as_deref(),
    default_limit,
  )
  .map_err(|e| ApiError::rule(&e, &caller))?;

  let history = state
    .ledger
    .history(&caller, user_id, page)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok(Json(HistoryResponse {
    user:       history.user,
    history:    history.entries.items.into_iter().map(EntryView::from).collect(),
    pagination: history.entries.pagination,
  }))
}

// ─── Redeem ───────────────────────────────────────────────────────────────────

/// `POST /fidelity-points/{userId}/redeem`
pub async fn redeem<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(user_id): Path<Uuid>,
  Json(body): Json<Redemption>,
) -> Result<impl IntoResponse, ApiError> {
  let caller = auth.caller();
  let entry = state
    .ledger
    .redeem(&caller, user_id, body)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  let balance = state
    .ledger
    .balance(&caller, user_id)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok((StatusCode::CREATED, Json(EntryCreated { entry: entry.into(), balance })))
}

// ─── Integrity ────────────────────────────────────────────────────────────────

/// `GET /fidelity-points/{userId}/reconcile`
pub async fn reconcile<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(user_id): Path<Uuid>,
) -> Result<Json<ReconciliationView>, ApiError> {
  let caller = auth.caller();
  let r = state
    .ledger
    .reconcile(&caller, user_id)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok(Json(r.into()))
}

/// `POST /fidelity-points/{userId}/repair`. Returns the state found before
/// the repair.
pub async fn repair<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(user_id): Path<Uuid>,
) -> Result<Json<ReconciliationView>, ApiError> {
  let caller = auth.caller();
  let before = state
    .ledger
    .repair(&caller, user_id)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok(Json(before.into()))
}

/// `GET /fidelity-points/drift`
pub async fn drift<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
) -> Result<Json<Vec<ReconciliationView>>, ApiError> {
  let caller = auth.caller();
  let drifted = state
    .ledger
    .drift(&caller)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok(Json(drifted.into_iter().map(Into::into).collect()))
}

// ─── Me ───────────────────────────────────────────────────────────────────────

/// `GET /me`: the authenticated account with its current balance.
pub async fn me(auth: Authenticated) -> Json<User> { Json(auth.user) }

//! Handlers for `/orders` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/orders` | Staff. Body: `{"orderNumber","userId","total","status"?,"paymentStatus"?}` |
//! | `GET`   | `/orders/{orderId}` | Owner or staff |
//! | `PATCH` | `/orders/{orderId}` | Staff. Body: `{"status"?,"paymentStatus"?}` |
//! | `POST`  | `/orders/{orderId}/accrue` | Staff. 409 if already credited |

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use fidelis_core::{
  ledger::OrderTransition,
  order::{NewOrder, Order, OrderUpdate},
  store::LedgerStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{Json, Path},
  points::EntryView,
};

/// `POST /orders`
pub async fn create<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Json(body): Json<NewOrder>,
) -> Result<impl IntoResponse, ApiError> {
  let caller = auth.caller();
  let transition = state
    .ledger
    .register_order(&caller, body)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok((StatusCode::CREATED, Json(transition)))
}

/// `GET /orders/{orderId}`
pub async fn get_one<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
  let caller = auth.caller();
  let order = state
    .ledger
    .order(&caller, order_id)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok(Json(order))
}

/// `PATCH /orders/{orderId}`
pub async fn update<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(order_id): Path<Uuid>,
  Json(body): Json<OrderUpdate>,
) -> Result<Json<OrderTransition>, ApiError> {
  let caller = auth.caller();
  let transition = state
    .ledger
    .update_order(&caller, order_id, body)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok(Json(transition))
}

/// `POST /orders/{orderId}/accrue`
pub async fn accrue<S: LedgerStore>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
  let caller = auth.caller();
  let entry = state
    .ledger
    .accrue(&caller, order_id)
    .await
    .map_err(|e| ApiError::store(e, &caller))?;
  Ok((StatusCode::CREATED, Json(EntryView::from(entry))))
}

//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Staff callers see the precise reason a request was refused. Customers see
//! it only for authentication, authorisation and missing resources; anything
//! else gets a generic message they can act on by retrying.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use fidelis_core::{Error as LedgerError, caller::Caller, store::StoreError};
use serde_json::json;
use thiserror::Error;

const GENERIC_MESSAGE: &str =
  "Your request could not be completed. Please try again later.";

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  /// A ledger rule refused the request; `message` is already tailored to the
  /// caller.
  #[error("{message}")]
  Rejected { status: StatusCode, message: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a domain error as seen by `caller`.
  pub fn rule(err: &LedgerError, caller: &Caller) -> Self {
    let status = status_for(err);
    let message = if caller.is_staff() || is_disclosed(status) {
      err.to_string()
    } else {
      GENERIC_MESSAGE.to_owned()
    };
    Self::Rejected { status, message }
  }

  /// Map a store error; I/O failures are logged and hidden behind a 500.
  pub fn store<E: StoreError>(err: E, caller: &Caller) -> Self {
    match err.ledger_error() {
      Some(rule) => Self::rule(rule, caller),
      None => {
        tracing::error!(error = %err, user_id = %caller.user_id, "store failure");
        Self::Store(Box::new(err))
      }
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::Rejected { status, .. } => *status,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

pub fn status_for(err: &LedgerError) -> StatusCode {
  match err {
    LedgerError::UserNotFound(_) | LedgerError::OrderNotFound(_) => StatusCode::NOT_FOUND,
    LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
    LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
    LedgerError::DuplicateAccrual(_)
    | LedgerError::DuplicateRefund(_)
    | LedgerError::DuplicateEmail(_)
    | LedgerError::DuplicateOrderNumber(_) => StatusCode::CONFLICT,
    LedgerError::InvalidOrderState { .. } | LedgerError::InsufficientBalance { .. } => {
      StatusCode::UNPROCESSABLE_ENTITY
    }
    LedgerError::UnknownEntryType(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

fn is_disclosed(status: StatusCode) -> bool {
  matches!(
    status,
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
  )
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    match self {
      ApiError::Unauthorized => {
        let mut res =
          (status, Json(json!({ "error": "authentication required" }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"fidelis\""),
        );
        res
      }
      ApiError::Rejected { message, .. } => {
        (status, Json(json!({ "error": message }))).into_response()
      }
      ApiError::Store(_) => (status, Json(json!({ "error": GENERIC_MESSAGE }))).into_response(),
    }
  }
}

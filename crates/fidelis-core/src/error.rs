//! Error types for `fidelis-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::order::{OrderStatus, PaymentStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("order not found: {0}")]
  OrderNotFound(Uuid),

  #[error(
    "order {order_id} is not eligible for points (status {status}, payment \
     {payment_status})"
  )]
  InvalidOrderState {
    order_id:       Uuid,
    status:         OrderStatus,
    payment_status: PaymentStatus,
  },

  #[error("points were already credited for order {0}")]
  DuplicateAccrual(Uuid),

  #[error("points were already reversed for order {0}")]
  DuplicateRefund(Uuid),

  #[error(
    "insufficient balance: user {user_id} has {balance} points, operation \
     would result in negative balance ({delta})"
  )]
  InsufficientBalance {
    user_id: Uuid,
    balance: i64,
    delta:   i64,
  },

  #[error("forbidden: {0}")]
  Forbidden(&'static str),

  #[error("validation error: {0}")]
  Validation(String),

  #[error("email already registered: {0}")]
  DuplicateEmail(String),

  #[error("order number already registered: {0}")]
  DuplicateOrderNumber(String),

  #[error("unknown ledger entry type: {0:?}")]
  UnknownEntryType(String),
}

impl Error {
  /// `true` for the "target does not exist" family.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::UserNotFound(_) | Self::OrderNotFound(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

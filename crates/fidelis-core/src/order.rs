//! Order summaries as seen by the ledger.
//!
//! Orders belong to the storefront's checkout subsystem. The ledger keeps only
//! what accrual and refunds need: the owner, the final total and the two
//! status fields that decide eligibility.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Fulfilment status of an order.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
  #[default]
  Pending,
  Confirmed,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
  Refunded,
}

/// Payment status of an order.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
  #[default]
  Pending,
  Completed,
  Failed,
  Cancelled,
  Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id:             Uuid,
  pub order_number:   String,
  pub user_id:        Uuid,
  /// Final amount in TND.
  pub total:          Decimal,
  pub status:         OrderStatus,
  pub payment_status: PaymentStatus,
  pub created_at:     DateTime<Utc>,
  pub delivered_at:   Option<DateTime<Utc>>,
}

impl Order {
  /// `true` once the order has been cancelled or refunded on either axis.
  pub fn is_reversed(&self) -> bool {
    matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded)
      || matches!(
        self.payment_status,
        PaymentStatus::Cancelled | PaymentStatus::Refunded
      )
  }
}

/// The order fields joined onto a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRef {
  pub order_number: String,
  pub total:        Decimal,
}

/// Input to [`crate::store::LedgerStore::create_order`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
  pub order_number:   String,
  pub user_id:        Uuid,
  pub total:          Decimal,
  #[serde(default)]
  pub status:         OrderStatus,
  #[serde(default)]
  pub payment_status: PaymentStatus,
}

impl NewOrder {
  pub fn new(order_number: impl Into<String>, user_id: Uuid, total: Decimal) -> Self {
    Self {
      order_number: order_number.into(),
      user_id,
      total,
      status: OrderStatus::default(),
      payment_status: PaymentStatus::default(),
    }
  }
}

/// A status transition. Absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
  pub status:         Option<OrderStatus>,
  pub payment_status: Option<PaymentStatus>,
}

impl OrderUpdate {
  pub fn is_empty(&self) -> bool {
    self.status.is_none() && self.payment_status.is_none()
  }
}

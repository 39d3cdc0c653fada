//! Accrual rules: how many points an order earns, and when.
//!
//! Customers earn 2% of a delivered and paid order's total, expressed in
//! points scaled by 1000 (200 TND → 4000 points). The computation is exact
//! decimal arithmetic rounded half away from zero.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive as _};

use crate::{
  Error, Result,
  entry::{EntryType, NewEntry},
  order::{Order, OrderStatus, PaymentStatus},
};

/// Share of the order total converted to points (2%).
pub const ACCRUAL_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Points per unit of currency earned.
pub const POINTS_SCALE: i64 = 1000;

/// Decimal places an order total may carry (millimes).
pub const TOTAL_SCALE: u32 = 3;

/// Points earned for an order total.
pub fn points_for_total(total: Decimal) -> Result<i64> {
  if total.is_sign_negative() && !total.is_zero() {
    return Err(Error::Validation(format!("order total must not be negative: {total}")));
  }

  total
    .checked_mul(ACCRUAL_RATE)
    .and_then(|v| v.checked_mul(Decimal::from(POINTS_SCALE)))
    .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
    .and_then(|v| v.to_i64())
    .ok_or_else(|| Error::Validation(format!("order total out of range: {total}")))
}

/// Reject totals that are negative, finer than a millime, or too large to be
/// converted into points.
pub fn check_total(total: Decimal) -> Result<()> {
  if total.normalize().scale() > TOTAL_SCALE {
    return Err(Error::Validation(format!(
      "order total must have at most {TOTAL_SCALE} decimals: {total}"
    )));
  }
  points_for_total(total).map(|_| ())
}

/// An order earns points once it is both delivered and paid.
pub fn is_points_eligible(status: OrderStatus, payment_status: PaymentStatus) -> bool {
  status == OrderStatus::Delivered && payment_status == PaymentStatus::Completed
}

/// Build the `EARNED_PURCHASE` entry for `order`.
pub fn plan_accrual(order: &Order) -> Result<NewEntry> {
  if !is_points_eligible(order.status, order.payment_status) {
    return Err(Error::InvalidOrderState {
      order_id:       order.id,
      status:         order.status,
      payment_status: order.payment_status,
    });
  }

  Ok(NewEntry {
    user_id:     order.user_id,
    points:      points_for_total(order.total)?,
    entry_type:  EntryType::EarnedPurchase,
    description: format!("Achat en ligne — Commande #{}", order.order_number),
    reference:   Some(order.order_number.clone()),
    order_id:    Some(order.id),
    created_by:  None,
  })
}

/// Build the `REFUND` entry reversing `earned` points for a cancelled or
/// refunded order.
pub fn plan_refund(order: &Order, earned: i64) -> NewEntry {
  NewEntry {
    user_id:     order.user_id,
    points:      -earned,
    entry_type:  EntryType::Refund,
    description: format!(
      "Points remboursés pour la commande annulée #{}",
      order.order_number
    ),
    reference:   Some(order.order_number.clone()),
    order_id:    Some(order.id),
    created_by:  None,
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use chrono::Utc;
  use uuid::Uuid;

  use super::*;

  fn dec(s: &str) -> Decimal { Decimal::from_str(s).unwrap() }

  fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
    Order {
      id: Uuid::new_v4(),
      order_number: "ORD-1730000000000-K3J9".into(),
      user_id: Uuid::new_v4(),
      total: dec("200.000"),
      status,
      payment_status,
      created_at: Utc::now(),
      delivered_at: None,
    }
  }

  #[test]
  fn two_hundred_dinars_earn_four_thousand_points() {
    assert_eq!(points_for_total(dec("200.00")).unwrap(), 4000);
  }

  #[test]
  fn small_totals() {
    assert_eq!(points_for_total(Decimal::ZERO).unwrap(), 0);
    assert_eq!(points_for_total(dec("0.001")).unwrap(), 0);
    assert_eq!(points_for_total(dec("0.05")).unwrap(), 1);
    assert_eq!(points_for_total(dec("12.345")).unwrap(), 247);
  }

  #[test]
  fn exact_halves_round_away_from_zero() {
    // 0.025 * 20 = 0.5, 0.075 * 20 = 1.5, 10.125 * 20 = 202.5
    assert_eq!(points_for_total(dec("0.025")).unwrap(), 1);
    assert_eq!(points_for_total(dec("0.075")).unwrap(), 2);
    assert_eq!(points_for_total(dec("10.125")).unwrap(), 203);
    // Just below a half rounds down.
    assert_eq!(points_for_total(dec("10.1249")).unwrap(), 202);
  }

  #[test]
  fn negative_total_is_rejected() {
    assert!(matches!(points_for_total(dec("-1")), Err(Error::Validation(_))));
  }

  #[test]
  fn totals_are_checked_for_scale_and_range() {
    assert!(check_total(dec("89.500")).is_ok());
    assert!(check_total(dec("200.0000")).is_ok());
    assert!(matches!(check_total(dec("10.1249")), Err(Error::Validation(_))));
    assert!(matches!(check_total(dec("-0.5")), Err(Error::Validation(_))));
    assert!(matches!(check_total(dec("1000000000000000000")), Err(Error::Validation(_))));
  }

  #[test]
  fn eligibility_needs_delivery_and_payment() {
    assert!(is_points_eligible(OrderStatus::Delivered, PaymentStatus::Completed));
    assert!(!is_points_eligible(OrderStatus::Delivered, PaymentStatus::Pending));
    assert!(!is_points_eligible(OrderStatus::Shipped, PaymentStatus::Completed));
    assert!(!is_points_eligible(OrderStatus::Cancelled, PaymentStatus::Completed));
  }

  #[test]
  fn planned_accrual_references_the_order() {
    let o = order(OrderStatus::Delivered, PaymentStatus::Completed);
    let e = plan_accrual(&o).unwrap();
    assert_eq!(e.points, 4000);
    assert_eq!(e.entry_type, EntryType::EarnedPurchase);
    assert_eq!(e.order_id, Some(o.id));
    assert_eq!(e.reference.as_deref(), Some("ORD-1730000000000-K3J9"));
    assert!(e.description.ends_with("Commande #ORD-1730000000000-K3J9"));
  }

  #[test]
  fn ineligible_order_is_rejected() {
    let o = order(OrderStatus::Shipped, PaymentStatus::Completed);
    assert!(matches!(plan_accrual(&o), Err(Error::InvalidOrderState { .. })));
  }

  #[test]
  fn refund_negates_earned_points() {
    let o = order(OrderStatus::Cancelled, PaymentStatus::Refunded);
    let e = plan_refund(&o, 4000);
    assert_eq!(e.points, -4000);
    assert_eq!(e.entry_type, EntryType::Refund);
  }
}

//! The `Ledger` service: every fidelity-points operation, authorised and
//! routed through a [`LedgerStore`].
//!
//! Rules that need no database (eligibility, rounding, validation, roles)
//! live in [`crate::accrual`] and [`crate::adjustment`]; rules that need the
//! current balance or the existing entries are enforced atomically by the
//! store. This type only sequences the two.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  accrual::{check_total, plan_accrual},
  adjustment::{Adjustment, Redemption, plan_adjustment, plan_redemption},
  balance::Reconciliation,
  caller::Caller,
  entry::LedgerEntry,
  order::{NewOrder, Order, OrderUpdate},
  page::{Page, PageRequest},
  store::{LedgerStore, MemberQuery, OrderWrite},
  user::User,
};

/// A user's ledger page together with the owner's current balance.
#[derive(Debug, Clone, Serialize)]
pub struct History {
  pub user:    User,
  pub entries: Page<LedgerEntry>,
}

/// The outcome of [`Ledger::update_order`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTransition {
  pub order:           Order,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub points_awarded:  Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub points_refunded: Option<i64>,
  /// Why an owed reversal was not applied.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub refund_skipped:  Option<String>,
}

pub struct Ledger<S> {
  store: Arc<S>,
}

impl<S> Clone for Ledger<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: LedgerStore> Ledger<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  // ── Balance ───────────────────────────────────────────────────────────

  /// The cached balance. Never recomputed from history here.
  pub async fn balance(&self, caller: &Caller, user_id: Uuid) -> Result<i64, S::Error> {
    caller.require_self_or_staff(user_id)?;
    Ok(self.require_user(user_id).await?.fidelity_points)
  }

  pub async fn user(&self, caller: &Caller, user_id: Uuid) -> Result<User, S::Error> {
    caller.require_self_or_staff(user_id)?;
    self.require_user(user_id).await
  }

  // ── Accrual ───────────────────────────────────────────────────────────

  /// Staff-triggered accrual for `order_id`.
  ///
  /// A second accrual for the same order fails with `DuplicateAccrual`.
  pub async fn accrue(&self, caller: &Caller, order_id: Uuid) -> Result<LedgerEntry, S::Error> {
    caller.require_staff()?;
    let order = self.require_order(order_id).await?;
    let entry = self.store.append(plan_accrual(&order)?).await?;
    log_credit(&order, &entry);
    Ok(entry)
  }

  /// Apply a status transition. The store credits an order that becomes
  /// delivered and paid, and reverses a credited order that is cancelled or
  /// refunded, in the same transaction as the transition. Both are
  /// idempotent.
  pub async fn update_order(
    &self,
    caller: &Caller,
    order_id: Uuid,
    update: OrderUpdate,
  ) -> Result<OrderTransition, S::Error> {
    caller.require_staff()?;
    if update.is_empty() {
      return Err(Error::Validation("status or paymentStatus is required".into()).into());
    }

    let write = self.store.update_order(order_id, update).await?;
    tracing::info!(
      order_id = %write.order.id,
      status = %write.order.status,
      payment_status = %write.order.payment_status,
      "order status updated"
    );
    Ok(settled(write))
  }

  // ── Adjustments ───────────────────────────────────────────────────────

  pub async fn adjust(&self, caller: &Caller, adj: Adjustment) -> Result<LedgerEntry, S::Error> {
    let entry = plan_adjustment(caller, adj)?;
    let entry = self.store.append(entry).await?;
    tracing::info!(
      user_id = %entry.user_id,
      operator = %caller.user_id,
      points = entry.points,
      entry_type = %entry.entry_type,
      "manual points adjustment"
    );
    Ok(entry)
  }

  pub async fn redeem(
    &self,
    caller: &Caller,
    user_id: Uuid,
    redemption: Redemption,
  ) -> Result<LedgerEntry, S::Error> {
    let entry = plan_redemption(caller, user_id, redemption)?;
    let entry = self.store.append(entry).await?;
    tracing::info!(user_id = %user_id, points = entry.points, "points redeemed");
    Ok(entry)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn history(
    &self,
    caller: &Caller,
    user_id: Uuid,
    page: PageRequest,
  ) -> Result<History, S::Error> {
    caller.require_self_or_staff(user_id)?;
    let user = self.require_user(user_id).await?;
    let entries = self.store.history(user_id, page).await?;
    Ok(History { user, entries })
  }

  pub async fn members(&self, caller: &Caller, query: &MemberQuery) -> Result<Page<User>, S::Error> {
    caller.require_staff()?;
    self.store.list_members(query).await
  }

  // ── Orders ────────────────────────────────────────────────────────────

  /// Record an order summary. An order registered already delivered and
  /// paid is credited straight away.
  pub async fn register_order(
    &self,
    caller: &Caller,
    input: NewOrder,
  ) -> Result<OrderTransition, S::Error> {
    caller.require_staff()?;
    if input.order_number.trim().is_empty() {
      return Err(Error::Validation("orderNumber is required".into()).into());
    }
    check_total(input.total)?;

    let write = self.store.create_order(input).await?;
    tracing::info!(
      order_id = %write.order.id,
      order_number = %write.order.order_number,
      "order registered"
    );
    Ok(settled(write))
  }

  pub async fn order(&self, caller: &Caller, order_id: Uuid) -> Result<Order, S::Error> {
    let order = self.require_order(order_id).await?;
    caller.require_self_or_staff(order.user_id)?;
    Ok(order)
  }

  // ── Integrity ─────────────────────────────────────────────────────────

  pub async fn reconcile(&self, caller: &Caller, user_id: Uuid) -> Result<Reconciliation, S::Error> {
    caller.require_staff()?;
    self.store.reconcile(user_id).await
  }

  pub async fn drift(&self, caller: &Caller) -> Result<Vec<Reconciliation>, S::Error> {
    caller.require_staff()?;
    self.store.reconcile_all().await
  }

  pub async fn repair(&self, caller: &Caller, user_id: Uuid) -> Result<Reconciliation, S::Error> {
    caller.require_admin()?;
    let before = self.store.repair_balance(user_id).await?;
    if !before.is_consistent() {
      tracing::warn!(
        user_id = %user_id,
        cached = before.cached_balance,
        ledger = before.ledger_sum,
        "cached balance repaired from ledger"
      );
    }
    Ok(before)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn require_user(&self, user_id: Uuid) -> Result<User, S::Error> {
    self
      .store
      .get_user(user_id)
      .await?
      .ok_or_else(|| Error::UserNotFound(user_id).into())
  }

  async fn require_order(&self, order_id: Uuid) -> Result<Order, S::Error> {
    self
      .store
      .get_order(order_id)
      .await?
      .ok_or_else(|| Error::OrderNotFound(order_id).into())
  }
}

fn log_credit(order: &Order, entry: &LedgerEntry) {
  tracing::info!(
    order_id = %order.id,
    order_number = %order.order_number,
    user_id = %order.user_id,
    points = entry.points,
    "fidelity points credited"
  );
}

/// Log what an order write settled and shape it for callers.
fn settled(write: OrderWrite) -> OrderTransition {
  let OrderWrite { order, credited, reversed, reversal_skipped } = write;

  if let Some(entry) = &credited {
    log_credit(&order, entry);
  }
  if let Some(entry) = &reversed {
    tracing::info!(
      order_id = %order.id,
      user_id = %order.user_id,
      points = entry.points,
      "fidelity points reversed"
    );
  }
  if let Some(err) = &reversal_skipped {
    tracing::warn!(order_id = %order.id, error = %err, "points reversal skipped");
  }

  OrderTransition {
    order,
    points_awarded: credited.map(|e| e.points),
    points_refunded: reversed.map(|e| -e.points),
    refund_skipped: reversal_skipped.map(|e| e.to_string()),
  }
}

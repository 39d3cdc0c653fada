//! The `LedgerStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `fidelis-store-sqlite`).
//! The [`Ledger`](crate::ledger::Ledger) service and the HTTP layer depend on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Error,
  balance::Reconciliation,
  entry::{EntryType, LedgerEntry, NewEntry},
  order::{NewOrder, Order, OrderUpdate},
  page::{Page, PageRequest},
  user::{NewUser, User},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`LedgerStore::list_members`].
#[derive(Debug, Clone, Default)]
pub struct MemberQuery {
  /// Case-insensitive substring over email, names and phone.
  pub search: Option<String>,
  pub page:   PageRequest,
}

/// An order write together with the points it settled in the same
/// transaction.
#[derive(Debug)]
pub struct OrderWrite {
  pub order:            Order,
  /// The `EARNED_PURCHASE` entry appended because the order became
  /// delivered and paid.
  pub credited:         Option<LedgerEntry>,
  /// The `REFUND` entry appended because a credited order was cancelled or
  /// refunded.
  pub reversed:         Option<LedgerEntry>,
  /// Why an owed reversal was left out: the balance no longer covers it.
  pub reversal_skipped: Option<Error>,
}

impl OrderWrite {
  pub fn unsettled(order: Order) -> Self {
    Self { order, credited: None, reversed: None, reversal_skipped: None }
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend errors must be able to expose the domain failure they carry, so
/// callers can tell a rule violation from an I/O failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn ledger_error(&self) -> Option<&crate::Error>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a fidelity-ledger backend.
///
/// Ledger entries are append-only. [`LedgerStore::append`] is the only way to
/// move a balance and must write the entry and the balance change atomically.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait LedgerStore: Send + Sync {
  type Error: StoreError + From<crate::Error>;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new account with a zero balance. Fails with
  /// [`DuplicateEmail`](crate::Error::DuplicateEmail) if the email is taken.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Retrieve a user by id. Returns `None` if not found.
  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Look up a user and their password hash by email (case-insensitive).
  fn find_credentials<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<(User, String)>, Self::Error>> + Send + 'a;

  /// Accounts of every role, ordered by balance descending, then by creation
  /// time.
  fn list_members<'a>(
    &'a self,
    query: &'a MemberQuery,
  ) -> impl Future<Output = Result<Page<User>, Self::Error>> + Send + 'a;

  // ── Orders ────────────────────────────────────────────────────────────

  /// Register an order summary for an existing user. An order registered
  /// delivered and paid is credited in the same transaction; if the credit
  /// fails, the order is not stored either.
  fn create_order(
    &self,
    input: NewOrder,
  ) -> impl Future<Output = Result<OrderWrite, Self::Error>> + Send + '_;

  fn get_order(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Order>, Self::Error>> + Send + '_;

  /// Apply a status transition and settle its points in one transaction.
  ///
  /// Sets `delivered_at` the first time the order becomes `DELIVERED`. An
  /// order left delivered and paid is credited unless it already was; a
  /// credited order left cancelled or refunded is reversed unless it already
  /// was. A reversal the balance cannot cover is reported in
  /// [`OrderWrite::reversal_skipped`] and the transition still applies. Any
  /// other failure leaves the order untouched.
  fn update_order(
    &self,
    id: Uuid,
    update: OrderUpdate,
  ) -> impl Future<Output = Result<OrderWrite, Self::Error>> + Send + '_;

  // ── Ledger ────────────────────────────────────────────────────────────

  /// Append an entry and apply its delta to the owner's balance in one
  /// transaction.
  ///
  /// Fails, leaving no trace, with:
  /// - `UserNotFound` / `OrderNotFound` for dangling references;
  /// - `DuplicateAccrual` / `DuplicateRefund` for a second order-bound entry
  ///   of the same type on one order;
  /// - `InsufficientBalance` if a negative delta would leave the balance
  ///   below zero;
  /// - `Validation` if the new balance would not fit in an `i64`.
  fn append(
    &self,
    entry: NewEntry,
  ) -> impl Future<Output = Result<LedgerEntry, Self::Error>> + Send + '_;

  /// The entry of `entry_type` recorded against `order_id`, if any.
  fn order_entry(
    &self,
    order_id: Uuid,
    entry_type: EntryType,
  ) -> impl Future<Output = Result<Option<LedgerEntry>, Self::Error>> + Send + '_;

  /// One page of `user_id`'s entries, newest first (`created_at`, then
  /// `seq`), read from a single consistent snapshot. Fails with
  /// `UserNotFound` for unknown users.
  fn history(
    &self,
    user_id: Uuid,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<LedgerEntry>, Self::Error>> + Send + '_;

  // ── Integrity ─────────────────────────────────────────────────────────

  /// Compare `user_id`'s cached balance with their ledger sum.
  fn reconcile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Reconciliation, Self::Error>> + Send + '_;

  /// Every user whose cached balance has drifted from their ledger sum.
  fn reconcile_all(
    &self,
  ) -> impl Future<Output = Result<Vec<Reconciliation>, Self::Error>> + Send + '_;

  /// Reset `user_id`'s cached balance to their ledger sum. Returns the
  /// reconciliation observed before the reset.
  fn repair_balance(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Reconciliation, Self::Error>> + Send + '_;
}

//! Balance integrity checks.
//!
//! The cached `fidelity_points` column must always equal the sum of the
//! owner's ledger entries. Reconciliation compares the two; repair resets the
//! cache from the ledger and is never part of the normal read path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
  pub user_id:        Uuid,
  pub cached_balance: i64,
  pub ledger_sum:     i64,
}

impl Reconciliation {
  /// `cached_balance - ledger_sum`; zero when consistent.
  pub fn drift(&self) -> i64 { self.cached_balance - self.ledger_sum }

  pub fn is_consistent(&self) -> bool { self.drift() == 0 }
}

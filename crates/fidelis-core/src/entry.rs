//! Ledger entries — the append-only record of every balance change.
//!
//! An entry is written exactly once, in the same transaction that moves the
//! owner's cached balance by `points`. Entries are never updated or deleted;
//! mistakes are corrected with a compensating entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::order::OrderRef;

// ─── Entry type ──────────────────────────────────────────────────────────────

/// Why a balance changed. Stored verbatim in the `entry_type` column.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
  EarnedPurchase,
  ManualAdd,
  ManualDeduct,
  Redeemed,
  /// Present for storefront compatibility; nothing in this workspace emits it.
  Expired,
  Refund,
}

impl EntryType {
  /// French label shown by the storefront.
  pub fn label(self) -> &'static str {
    match self {
      Self::EarnedPurchase => "Achat en ligne",
      Self::ManualAdd => "Ajout manuel",
      Self::ManualDeduct => "Déduction",
      Self::Redeemed => "Points utilisés",
      Self::Expired => "Expiration",
      Self::Refund => "Remboursement",
    }
  }

  /// Types that must reference an order, at most once per order.
  pub fn is_order_bound(self) -> bool {
    matches!(self, Self::EarnedPurchase | Self::Refund)
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// A persisted ledger entry, joined with its originating order if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
  pub id:          Uuid,
  /// Store-assigned insertion number; strictly increasing.
  pub seq:         i64,
  pub user_id:     Uuid,
  /// Signed delta applied to the balance.
  pub points:      i64,
  #[serde(rename = "type")]
  pub entry_type:  EntryType,
  pub description: String,
  pub reference:   Option<String>,
  pub order_id:    Option<Uuid>,
  pub order:       Option<OrderRef>,
  /// The account that caused a manual adjustment or redemption.
  pub created_by:  Option<Uuid>,
  pub created_at:  DateTime<Utc>,
}

// ─── NewEntry ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::LedgerStore::append`].
///
/// `id`, `seq` and `created_at` are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
  pub user_id:     Uuid,
  pub points:      i64,
  pub entry_type:  EntryType,
  pub description: String,
  pub reference:   Option<String>,
  pub order_id:    Option<Uuid>,
  pub created_by:  Option<Uuid>,
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn every_type_has_a_label_and_round_trips_its_column_string() {
    for t in EntryType::iter() {
      assert!(!t.label().is_empty());
      assert_eq!(t.as_ref().parse::<EntryType>().unwrap(), t);
    }
    assert_eq!(EntryType::EarnedPurchase.as_ref(), "EARNED_PURCHASE");
    assert_eq!(EntryType::ManualDeduct.label(), "Déduction");
  }

  #[test]
  fn serde_uses_the_column_strings() {
    let json = serde_json::to_string(&EntryType::ManualAdd).unwrap();
    assert_eq!(json, "\"MANUAL_ADD\"");
  }

  #[test]
  fn only_purchase_and_refund_are_order_bound() {
    let bound: Vec<_> = EntryType::iter().filter(|t| t.is_order_bound()).collect();
    assert_eq!(bound, vec![EntryType::EarnedPurchase, EntryType::Refund]);
  }
}

//! Manual adjustments and redemptions.
//!
//! Both produce a single entry whose sign decides the direction. Whether a
//! debit is covered by the balance can only be decided inside the store's
//! write transaction, so these planners only validate input and authority.

use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  caller::Caller,
  entry::{EntryType, NewEntry},
};

/// Largest number of points a single adjustment or redemption may move.
pub const MAX_POINTS_PER_ENTRY: i64 = 1_000_000_000;

/// A staff-initiated credit (`points > 0`) or debit (`points < 0`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
  pub user_id:     Uuid,
  pub points:      i64,
  pub description: String,
  pub reference:   Option<String>,
}

/// A customer spending points.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
  pub points:    i64,
  pub reference: Option<String>,
}

/// Validate `adj` on behalf of `caller` and build its entry.
pub fn plan_adjustment(caller: &Caller, adj: Adjustment) -> Result<NewEntry> {
  caller.require_staff()?;

  if adj.points == 0 {
    return Err(Error::Validation("points must be a non-zero integer".into()));
  }
  if adj.points.unsigned_abs() > MAX_POINTS_PER_ENTRY.unsigned_abs() {
    return Err(Error::Validation(format!(
      "points must not exceed {MAX_POINTS_PER_ENTRY} in either direction"
    )));
  }
  let description = adj.description.trim();
  if description.is_empty() {
    return Err(Error::Validation("description is required".into()));
  }

  let entry_type = if adj.points > 0 {
    EntryType::ManualAdd
  } else {
    EntryType::ManualDeduct
  };

  Ok(NewEntry {
    user_id: adj.user_id,
    points: adj.points,
    entry_type,
    description: description.to_owned(),
    reference: normalise_reference(adj.reference),
    order_id: None,
    created_by: Some(caller.user_id),
  })
}

/// Validate a redemption of `user_id`'s points and build its entry.
pub fn plan_redemption(
  caller: &Caller,
  user_id: Uuid,
  redemption: Redemption,
) -> Result<NewEntry> {
  caller.require_self_or_staff(user_id)?;

  if redemption.points <= 0 {
    return Err(Error::Validation("redeemed points must be positive".into()));
  }
  if redemption.points > MAX_POINTS_PER_ENTRY {
    return Err(Error::Validation(format!(
      "redeemed points must not exceed {MAX_POINTS_PER_ENTRY}"
    )));
  }

  let reference = normalise_reference(redemption.reference);
  let description = match &reference {
    Some(r) => format!("Points utilisés — {r}"),
    None => "Points utilisés".to_owned(),
  };

  Ok(NewEntry {
    user_id,
    points: -redemption.points,
    entry_type: EntryType::Redeemed,
    description,
    reference,
    order_id: None,
    created_by: Some(caller.user_id),
  })
}

fn normalise_reference(reference: Option<String>) -> Option<String> {
  reference
    .map(|r| r.trim().to_owned())
    .filter(|r| !r.is_empty())
}

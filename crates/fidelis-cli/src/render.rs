//! Plain-text rendering of API responses.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use fidelis_core::{balance::Reconciliation, entry::LedgerEntry, page::Pagination, user::User};

fn date(dt: DateTime<Utc>) -> String {
  dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Signed points with an explicit `+` for credits.
pub fn points(p: i64) -> String {
  if p > 0 { format!("+{p}") } else { p.to_string() }
}

pub fn user(u: &User) -> String {
  format!(
    "{}  {:<32} {:<8} {:>8} pts",
    u.id,
    truncate(&u.display_name(), 32),
    u.role.as_ref(),
    u.fidelity_points
  )
}

pub fn entry(e: &LedgerEntry) -> String {
  let mut line = format!(
    "{}  {:>8}  {:<16} {}",
    date(e.created_at),
    points(e.points),
    e.entry_type.label(),
    e.description
  );
  if let Some(o) = &e.order {
    let _ = write!(line, "  [{} · {} TND]", o.order_number, o.total);
  }
  line
}

pub fn pagination(p: &Pagination) -> String {
  let mut line = format!("page {}/{} · {} total", p.page, p.total_pages.max(1), p.total);
  if let Some(s) = p.snapshot {
    let _ = write!(line, " · snapshot {s}");
  }
  line
}

pub fn reconciliation(r: &Reconciliation) -> String {
  let status = if r.is_consistent() { "ok" } else { "DRIFT" };
  format!(
    "{}  cached={} ledger={} drift={} {status}",
    r.user_id,
    r.cached_balance,
    r.ledger_sum,
    r.drift()
  )
}

fn truncate(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_owned()
  } else {
    let mut out: String = s.chars().take(max - 1).collect();
    out.push('…');
    out
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn credits_carry_a_plus_sign() {
    assert_eq!(points(1000), "+1000");
    assert_eq!(points(-500), "-500");
    assert_eq!(points(0), "0");
  }

  #[test]
  fn long_names_are_truncated() {
    assert_eq!(truncate("abcdef", 4), "abc…");
    assert_eq!(truncate("abc", 4), "abc");
  }

  #[test]
  fn drift_is_flagged() {
    let r = Reconciliation { user_id: Uuid::nil(), cached_balance: 900, ledger_sum: 700 };
    let line = reconciliation(&r);
    assert!(line.contains("drift=200"));
    assert!(line.ends_with("DRIFT"));
  }

  #[test]
  fn empty_pagination_reads_as_one_page() {
    let p = Pagination { total: 0, page: 1, limit: 10, total_pages: 0, snapshot: None };
    assert_eq!(pagination(&p), "page 1/1 · 0 total");
  }
}

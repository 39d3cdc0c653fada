//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width so
//! that text ordering matches time ordering. Enums are stored as their
//! `SCREAMING_SNAKE_CASE` names, money as decimal strings and UUIDs as
//! hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use fidelis_core::{
  entry::LedgerEntry,
  order::{Order, OrderRef},
  user::User,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Current time truncated to what the column can hold, so values returned to
/// callers compare equal to values read back later.
pub fn now() -> DateTime<Utc> {
  let now = Utc::now();
  decode_dt(&encode_dt(now)).unwrap_or(now)
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::UnknownEnumValue { column, value: s.to_owned() })
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str =
  "user_id, email, first_name, last_name, phone, role, fidelity_points, created_at";

/// Raw values read directly from a `users` row, in [`USER_COLUMNS`] order.
pub struct RawUser {
  pub user_id:         String,
  pub email:           String,
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub phone:           Option<String>,
  pub role:            String,
  pub fidelity_points: i64,
  pub created_at:      String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:         row.get(0)?,
      email:           row.get(1)?,
      first_name:      row.get(2)?,
      last_name:       row.get(3)?,
      phone:           row.get(4)?,
      role:            row.get(5)?,
      fidelity_points: row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:              decode_uuid(&self.user_id)?,
      email:           self.email,
      first_name:      self.first_name,
      last_name:       self.last_name,
      phone:           self.phone,
      role:            decode_enum("role", &self.role)?,
      fidelity_points: self.fidelity_points,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub const ORDER_COLUMNS: &str = "order_id, order_number, user_id, total, status, \
                                 payment_status, created_at, delivered_at";

/// Raw values read directly from an `orders` row, in [`ORDER_COLUMNS`] order.
pub struct RawOrder {
  pub order_id:       String,
  pub order_number:   String,
  pub user_id:        String,
  pub total:          String,
  pub status:         String,
  pub payment_status: String,
  pub created_at:     String,
  pub delivered_at:   Option<String>,
}

impl RawOrder {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      order_id:       row.get(0)?,
      order_number:   row.get(1)?,
      user_id:        row.get(2)?,
      total:          row.get(3)?,
      status:         row.get(4)?,
      payment_status: row.get(5)?,
      created_at:     row.get(6)?,
      delivered_at:   row.get(7)?,
    })
  }

  pub fn into_order(self) -> Result<Order> {
    Ok(Order {
      id:             decode_uuid(&self.order_id)?,
      order_number:   self.order_number,
      user_id:        decode_uuid(&self.user_id)?,
      total:          decode_decimal(&self.total)?,
      status:         decode_enum("status", &self.status)?,
      payment_status: decode_enum("payment_status", &self.payment_status)?,
      created_at:     decode_dt(&self.created_at)?,
      delivered_at:   self.delivered_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Ledger columns joined with the originating order's number and total.
pub const ENTRY_SELECT: &str = "
  SELECT e.entry_id, e.seq, e.user_id, e.points, e.entry_type, e.description,
         e.reference, e.order_id, e.created_by, e.created_at,
         o.order_number, o.total
  FROM fidelity_ledger_entries e
  LEFT JOIN orders o ON o.order_id = e.order_id";

/// Raw values read from an [`ENTRY_SELECT`] row.
pub struct RawEntry {
  pub entry_id:     String,
  pub seq:          i64,
  pub user_id:      String,
  pub points:       i64,
  pub entry_type:   String,
  pub description:  String,
  pub reference:    Option<String>,
  pub order_id:     Option<String>,
  pub created_by:   Option<String>,
  pub created_at:   String,
  // orders join
  pub order_number: Option<String>,
  pub order_total:  Option<String>,
}

impl RawEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:     row.get(0)?,
      seq:          row.get(1)?,
      user_id:      row.get(2)?,
      points:       row.get(3)?,
      entry_type:   row.get(4)?,
      description:  row.get(5)?,
      reference:    row.get(6)?,
      order_id:     row.get(7)?,
      created_by:   row.get(8)?,
      created_at:   row.get(9)?,
      order_number: row.get(10)?,
      order_total:  row.get(11)?,
    })
  }

  pub fn into_entry(self) -> Result<LedgerEntry> {
    let order = match (self.order_number, self.order_total) {
      (Some(order_number), Some(total)) => Some(OrderRef {
        order_number,
        total: decode_decimal(&total)?,
      }),
      _ => None,
    };

    Ok(LedgerEntry {
      id: decode_uuid(&self.entry_id)?,
      seq: self.seq,
      user_id: decode_uuid(&self.user_id)?,
      points: self.points,
      entry_type: decode_enum("entry_type", &self.entry_type)
        .map_err(|_| fidelis_core::Error::UnknownEntryType(self.entry_type.clone()))?,
      description: self.description,
      reference: self.reference,
      order_id: decode_opt_uuid(self.order_id)?,
      order,
      created_by: decode_opt_uuid(self.created_by)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_have_fixed_width() {
    let a = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let b = a + chrono::Duration::microseconds(120);
    assert_eq!(encode_dt(a), "2025-01-02T03:04:05.000000Z");
    assert_eq!(encode_dt(b), "2025-01-02T03:04:05.000120Z");
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn unknown_enum_value_is_reported_with_its_column() {
    let err = decode_enum::<fidelis_core::user::Role>("role", "ROOT").unwrap_err();
    assert!(matches!(err, Error::UnknownEnumValue { column: "role", .. }));
  }

  #[test]
  fn decimal_keeps_its_scale() {
    let d = decode_decimal("200.000").unwrap();
    assert_eq!(encode_decimal(d), "200.000");
  }
}

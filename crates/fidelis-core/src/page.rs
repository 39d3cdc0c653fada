//! Offset pagination with an optional snapshot cursor.
//!
//! Ledger reads are ordered newest first. Offsets alone shift when a new entry
//! lands between two page requests, so every page also reports the highest
//! `seq` it could see; passing that `snapshot` back pins later pages to the
//! same set of entries.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default page size for a customer reading their own ledger.
pub const DEFAULT_CUSTOMER_LIMIT: u32 = 10;

/// Default page size for back-office views.
pub const DEFAULT_STAFF_LIMIT: u32 = 20;

pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  /// 1-based.
  pub page:     u32,
  pub limit:    u32,
  /// Only entries with `seq <= snapshot` are visible when set.
  pub snapshot: Option<i64>,
}

impl PageRequest {
  pub fn new(page: u32, limit: u32) -> Result<Self> {
    if page == 0 {
      return Err(Error::Validation("page must be at least 1".into()));
    }
    if limit == 0 || limit > MAX_LIMIT {
      return Err(Error::Validation(format!(
        "limit must be between 1 and {MAX_LIMIT}"
      )));
    }
    Ok(Self { page, limit, snapshot: None })
  }

  /// Parse raw query-string values, applying `default_limit` when `limit` is
  /// absent.
  pub fn from_params(
    page: Option<&str>,
    limit: Option<&str>,
    snapshot: Option<&str>,
    default_limit: u32,
  ) -> Result<Self> {
    let page = parse_param("page", page)?.unwrap_or(1);
    let limit = parse_param("limit", limit)?.unwrap_or(default_limit);
    let mut req = Self::new(page, limit)?;
    req.snapshot = parse_param("snapshot", snapshot)?;
    Ok(req)
  }

  pub fn with_snapshot(mut self, snapshot: Option<i64>) -> Self {
    self.snapshot = snapshot;
    self
  }

  pub fn offset(&self) -> i64 { (i64::from(self.page) - 1) * i64::from(self.limit) }
}

impl Default for PageRequest {
  fn default() -> Self {
    Self { page: 1, limit: DEFAULT_CUSTOMER_LIMIT, snapshot: None }
  }
}

fn parse_param<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>> {
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    None => Ok(None),
    Some(s) => s
      .parse()
      .map(Some)
      .map_err(|_| Error::Validation(format!("{name} must be a positive integer, got {s:?}"))),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
  pub total:       u64,
  pub page:        u32,
  pub limit:       u32,
  pub total_pages: u64,
  /// Highest `seq` visible to this page; absent for non-ledger listings.
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub snapshot:    Option<i64>,
}

impl Pagination {
  pub fn new(req: &PageRequest, total: u64, snapshot: Option<i64>) -> Self {
    Self {
      total,
      page: req.page,
      limit: req.limit,
      total_pages: total.div_ceil(u64::from(req.limit)),
      snapshot,
    }
  }
}

/// One page of `T` plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:      Vec<T>,
  pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_apply_when_params_are_missing() {
    let req = PageRequest::from_params(None, None, None, DEFAULT_STAFF_LIMIT).unwrap();
    assert_eq!(req, PageRequest { page: 1, limit: 20, snapshot: None });
    assert_eq!(req.offset(), 0);
  }

  #[test]
  fn offset_is_zero_based() {
    let req = PageRequest::from_params(Some("3"), Some("10"), Some("42"), 20).unwrap();
    assert_eq!(req.offset(), 20);
    assert_eq!(req.snapshot, Some(42));
  }

  #[test]
  fn malformed_params_are_validation_errors() {
    for (page, limit) in [
      (Some("0"), None),
      (Some("-1"), None),
      (Some("abc"), None),
      (None, Some("0")),
      (None, Some("101")),
      (None, Some("1.5")),
    ] {
      assert!(
        matches!(PageRequest::from_params(page, limit, None, 10), Err(Error::Validation(_))),
        "page={page:?} limit={limit:?}"
      );
    }
  }

  #[test]
  fn total_pages_rounds_up() {
    let req = PageRequest::new(1, 10).unwrap();
    assert_eq!(Pagination::new(&req, 0, None).total_pages, 0);
    assert_eq!(Pagination::new(&req, 10, None).total_pages, 1);
    assert_eq!(Pagination::new(&req, 11, None).total_pages, 2);
  }
}

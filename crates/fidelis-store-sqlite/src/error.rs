//! Error type for `fidelis-store-sqlite`.

use fidelis_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A ledger rule rejected the operation; nothing was written.
  #[error(transparent)]
  Ledger(#[from] fidelis_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("decimal parse error: {0}")]
  Decimal(#[from] rust_decimal::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value: {value:?}")]
  UnknownEnumValue {
    column: &'static str,
    value:  String,
  },
}

impl StoreError for Error {
  fn ledger_error(&self) -> Option<&fidelis_core::Error> {
    match self {
      Self::Ledger(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

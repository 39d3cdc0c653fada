//! The storefront account that owns a points balance.
//!
//! Accounts are managed by the storefront's auth subsystem; the ledger keeps a
//! projection with the one mutable field it owns, `fidelity_points`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Account role; mirrors the storefront's session roles.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
  #[default]
  Client,
  Employee,
  Admin,
}

impl Role {
  /// Back-office roles: may adjust balances and read any ledger.
  pub fn is_staff(self) -> bool { matches!(self, Self::Employee | Self::Admin) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id:              Uuid,
  pub email:           String,
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub phone:           Option<String>,
  pub role:            Role,
  /// Cached running balance. Written only alongside a ledger entry.
  pub fidelity_points: i64,
  pub created_at:      DateTime<Utc>,
}

impl User {
  /// "First Last", falling back to the email address.
  pub fn display_name(&self) -> String {
    let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .filter(|s| !s.is_empty())
      .collect();
    if parts.is_empty() {
      self.email.clone()
    } else {
      parts.join(" ")
    }
  }
}

/// Input to [`crate::store::LedgerStore::create_user`].
///
/// New accounts always start with a zero balance.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
  pub email:         String,
  pub first_name:    Option<String>,
  pub last_name:     Option<String>,
  pub phone:         Option<String>,
  pub role:          Role,
  /// Argon2 PHC string. Accounts without one cannot authenticate.
  pub password_hash: Option<String>,
}

impl NewUser {
  pub fn new(email: impl Into<String>, role: Role) -> Self {
    Self { email: email.into(), role, ..Self::default() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(first: Option<&str>, last: Option<&str>) -> User {
    User {
      id:              Uuid::new_v4(),
      email:           "amira@example.tn".into(),
      first_name:      first.map(Into::into),
      last_name:       last.map(Into::into),
      phone:           None,
      role:            Role::Client,
      fidelity_points: 0,
      created_at:      Utc::now(),
    }
  }

  #[test]
  fn display_name_joins_present_parts() {
    assert_eq!(user(Some("Amira"), Some("Ben Salah")).display_name(), "Amira Ben Salah");
    assert_eq!(user(None, Some("Ben Salah")).display_name(), "Ben Salah");
    assert_eq!(user(None, None).display_name(), "amira@example.tn");
  }

  #[test]
  fn role_column_strings() {
    assert_eq!(Role::Employee.as_ref(), "EMPLOYEE");
    assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
    assert!("root".parse::<Role>().is_err());
    assert!(Role::Admin.is_staff());
    assert!(!Role::Client.is_staff());
  }
}

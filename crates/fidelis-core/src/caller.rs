//! The authenticated identity behind a request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, user::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
  pub user_id: Uuid,
  pub role:    Role,
}

impl Caller {
  pub fn new(user_id: Uuid, role: Role) -> Self { Self { user_id, role } }

  pub fn is_staff(&self) -> bool { self.role.is_staff() }

  pub fn require_staff(&self) -> Result<()> {
    if self.is_staff() {
      Ok(())
    } else {
      Err(Error::Forbidden("staff access required"))
    }
  }

  pub fn require_admin(&self) -> Result<()> {
    if self.role == Role::Admin {
      Ok(())
    } else {
      Err(Error::Forbidden("admin access required"))
    }
  }

  /// Customers may act on their own account; staff on any account.
  pub fn require_self_or_staff(&self, user_id: Uuid) -> Result<()> {
    if self.user_id == user_id || self.is_staff() {
      Ok(())
    } else {
      Err(Error::Forbidden("you can only access your own points"))
    }
  }
}

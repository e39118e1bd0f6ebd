//! Session-related types.
//!
//! The auth service writes the signed-in user into the shared session store;
//! the storefront only reads it.

use serde::{Deserialize, Serialize};

use shonifity_core::{UserId, UserRole};

/// Session-stored user identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    #[serde(default)]
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}

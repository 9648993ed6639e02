//! Account Entity
//!
//! A registered identity: email, password hash and role.

use std::fmt;

use chrono::{DateTime, Utc};
use platform::password::{ClearTextPassword, HashedPassword};
use serde::Serialize;

use crate::domain::value_object::{AccountId, AccountRole, Email};

/// Account entity
///
/// `password_hash` and `two_factor_secret` never leave this type; use
/// [`Account::view`] for anything sent to a caller.
#[derive(Clone)]
pub struct Account {
    /// Store-assigned identifier
    pub id: AccountId,
    /// Display name
    pub name: String,
    /// Unique, compared exactly as stored
    pub email: Email,
    pub password_hash: HashedPassword,
    pub role: AccountRole,
    pub two_factor_enabled: bool,
    /// Opaque second-factor secret
    pub two_factor_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Compare a clear text password against the stored hash
    pub fn check_password(&self, plain: &str, pepper: Option<&[u8]>) -> bool {
        let password = ClearTextPassword::new(plain);
        self.password_hash.verify(&password, pepper)
    }

    /// Redacted read model
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.as_str().to_string(),
            role: self.role,
            two_factor_enabled: self.two_factor_enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("two_factor_enabled", &self.two_factor_enabled)
            .finish_non_exhaustive()
    }
}

/// Data for inserting an account; id and timestamps come from the store
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    pub password_hash: HashedPassword,
    pub role: AccountRole,
}

/// Account as exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub role: AccountRole,
    pub two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of account roles
///
/// Stored and transmitted by code (`admin`, `user`, `viewer`). Nothing outside
/// this enum ever reaches the store or a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Admin,
    #[default]
    #[serde(rename = "user")]
    StandardUser,
    Viewer,
}

impl AccountRole {
    pub const ALL: [AccountRole; 3] = [
        AccountRole::Admin,
        AccountRole::StandardUser,
        AccountRole::Viewer,
    ];

    #[inline]
    pub const fn code(&self) -> &'static str {
        use AccountRole::*;
        match self {
            Admin => "admin",
            StandardUser => "user",
            Viewer => "viewer",
        }
    }

    /// Parse a role code; legacy Spanish codes are accepted
    ///
    /// Returns `None` for anything outside the closed set, so callers decide
    /// whether to reject (input) or coerce (stored data).
    pub fn from_code(code: &str) -> Option<Self> {
        use AccountRole::*;
        match code.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Admin),
            "user" | "usuario" | "standard_user" => Some(StandardUser),
            "viewer" | "visitante" => Some(Viewer),
            _ => None,
        }
    }

    /// Read a role from the store; unknown codes fall back to the default
    /// non-privileged role, never upwards
    pub fn from_stored(code: &str) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            tracing::warn!(role = %code, "Unknown stored role, coerced to standard user");
            AccountRole::default()
        })
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_code() {
        assert_eq!(AccountRole::from_code("admin"), Some(AccountRole::Admin));
        assert_eq!(AccountRole::from_code("user"), Some(AccountRole::StandardUser));
        assert_eq!(AccountRole::from_code("viewer"), Some(AccountRole::Viewer));
        assert_eq!(AccountRole::from_code("usuario"), Some(AccountRole::StandardUser));
        assert_eq!(AccountRole::from_code("visitante"), Some(AccountRole::Viewer));
        assert_eq!(AccountRole::from_code(" Admin "), Some(AccountRole::Admin));
        assert_eq!(AccountRole::from_code("superuser"), None);
    }

    #[test]
    fn test_stored_role_is_never_promoted() {
        assert_eq!(AccountRole::from_stored("root"), AccountRole::StandardUser);
        assert_eq!(AccountRole::from_stored("admin"), AccountRole::Admin);
    }

    #[test]
    fn test_role_display_and_serde() {
        assert_eq!(AccountRole::StandardUser.to_string(), "user");
        assert_eq!(
            serde_json::to_string(&AccountRole::StandardUser).unwrap(),
            "\"user\""
        );
        let role: AccountRole = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, AccountRole::Viewer);
    }
}

//! Sign Up
//!
//! Creates a new account. Does not sign the caller in.

use platform::password::ClearTextPassword;

use crate::application::audit::{AuditStatus, audit};
use crate::application::service::AuthService;
use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::entity::NewAccount;
use crate::domain::repository::{AccountRepository, AuthStore};
use crate::domain::validator::validate_user_data;
use crate::domain::value_object::{AccountId, AccountRole, Email};
use crate::error::{AuthError, AuthResult};

/// Sign up input
#[derive(Debug, Clone)]
pub struct SignUpInput {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Role code; defaults to the standard user role
    pub role: Option<String>,
}

/// Parse a caller-supplied role; anything outside the closed set is rejected
pub(crate) fn parse_role(code: &str) -> AuthResult<AccountRole> {
    AccountRole::from_code(code)
        .ok_or_else(|| AuthError::Validation(vec![format!("Invalid role: {code}")]))
}

impl<R, M, G> AuthService<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    pub async fn register(&self, input: SignUpInput) -> AuthResult<AccountId> {
        let name = input.name.trim().to_string();

        // Collect every problem, including an invalid role
        let mut errors = validate_user_data(&name, &input.email, &input.password)
            .err()
            .unwrap_or_default();
        let role = match input.role.as_deref().map(str::trim) {
            None | Some("") => Some(AccountRole::default()),
            Some(code) => match parse_role(code) {
                Ok(role) => Some(role),
                Err(AuthError::Validation(mut role_errors)) => {
                    errors.append(&mut role_errors);
                    None
                }
                Err(e) => return Err(e),
            },
        };
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }
        let role = role.unwrap_or_default();

        let email = Email::new(input.email)?;

        if self.repo.find_account_by_email(&email).await?.is_some() {
            audit("register", email.as_str(), AuditStatus::Failure, "email taken");
            return Err(AuthError::EmailTaken);
        }

        let password_hash = ClearTextPassword::new(input.password).hash(self.config.pepper())?;

        // The unique constraint still decides if two registrations race
        let account = self
            .repo
            .create_account(&NewAccount {
                name,
                email,
                password_hash,
                role,
            })
            .await?;

        audit(
            "register",
            &account.id.to_string(),
            AuditStatus::Success,
            role.code(),
        );
        tracing::info!(
            account_id = %account.id,
            role = %account.role,
            "Account registered"
        );

        Ok(account.id)
    }
}

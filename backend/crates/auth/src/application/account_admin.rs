//! Account Administration
//!
//! Role assignment and account maintenance. Callers are expected to have
//! passed `authorize` with the admin role.

use platform::password::ClearTextPassword;

use crate::application::audit::{AuditStatus, audit};
use crate::application::service::AuthService;
use crate::application::sign_up::parse_role;
use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::entity::{AccountView, Session, SessionSummary};
use crate::domain::repository::{AccountRepository, AuthStore};
use crate::domain::validator::{validate_email_format, validate_name, validate_new_password};
use crate::domain::value_object::{AccountId, Email};
use crate::error::{AuthError, AuthResult};

/// Partial account update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub two_factor_enabled: Option<bool>,
}

impl<R, M, G> AuthService<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    pub async fn assign_role(&self, account_id: AccountId, role: &str) -> AuthResult<()> {
        let role = parse_role(role.trim())?;

        if !self.repo.set_account_role(account_id, role).await? {
            return Err(AuthError::AccountNotFound);
        }

        audit(
            "assign_role",
            &account_id.to_string(),
            AuditStatus::Success,
            role.code(),
        );
        Ok(())
    }

    pub async fn get_account(&self, account_id: AccountId) -> AuthResult<AccountView> {
        self.repo
            .find_account_by_id(account_id)
            .await?
            .map(|account| account.view())
            .ok_or(AuthError::AccountNotFound)
    }

    pub async fn list_accounts(&self) -> AuthResult<Vec<AccountView>> {
        let accounts = self.repo.list_accounts().await?;
        Ok(accounts.iter().map(|account| account.view()).collect())
    }

    /// Apply `changes` after validating every supplied field
    pub async fn update_account(
        &self,
        account_id: AccountId,
        changes: AccountChanges,
    ) -> AuthResult<AccountView> {
        let mut errors = Vec::new();

        let name = changes.name.map(|n| n.trim().to_string());
        if let Some(name) = &name {
            if let Err(e) = validate_name(name) {
                errors.push(e);
            }
        }
        if let Some(email) = &changes.email {
            if !validate_email_format(email) {
                errors.push("Invalid email format".to_string());
            }
        }
        if let Some(password) = &changes.password {
            if let Err(mut e) = validate_new_password(password) {
                errors.append(&mut e);
            }
        }
        let role = match changes.role.as_deref().map(parse_role) {
            None => None,
            Some(Ok(role)) => Some(role),
            Some(Err(AuthError::Validation(mut e))) => {
                errors.append(&mut e);
                None
            }
            Some(Err(e)) => return Err(e),
        };
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let mut account = self
            .repo
            .find_account_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if let Some(name) = name {
            account.name = name;
        }
        if let Some(email) = changes.email {
            account.email = Email::new(email)?;
        }
        if let Some(password) = changes.password {
            account.password_hash = ClearTextPassword::new(password).hash(self.config.pepper())?;
        }
        if let Some(role) = role {
            account.role = role;
        }
        if let Some(enabled) = changes.two_factor_enabled {
            account.two_factor_enabled = enabled;
        }

        // Email uniqueness is left to the store constraint
        let account = self
            .repo
            .update_account(&account)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        audit(
            "update_account",
            &account.id.to_string(),
            AuditStatus::Success,
            "account updated",
        );
        Ok(account.view())
    }

    /// Delete an account together with its sessions
    pub async fn delete_account(&self, account_id: AccountId) -> AuthResult<()> {
        if !self.repo.delete_account(account_id).await? {
            return Err(AuthError::AccountNotFound);
        }

        audit(
            "delete_account",
            &account_id.to_string(),
            AuditStatus::Success,
            "account deleted",
        );
        Ok(())
    }

    /// Live sessions across every account
    pub async fn list_all_active_sessions(&self) -> AuthResult<Vec<SessionSummary>> {
        let sessions = self.sessions.list_all_active().await?;
        Ok(sessions.iter().map(Session::summary).collect())
    }
}

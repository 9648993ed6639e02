//! Sign Out
//!
//! Closes one session, every session of an account, or every session.

use crate::application::audit::{AuditStatus, audit};
use crate::application::service::AuthService;
use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::AccountId;
use crate::error::AuthResult;

impl<R, M, G> AuthService<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    /// Close the session named by `token`; `SessionNotFound` if already closed
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        self.sessions.invalidate(token).await?;
        tracing::info!("Session signed out");
        Ok(())
    }

    /// Close every session of one account
    ///
    /// The caller's admin role is checked before this is reached.
    pub async fn logout_all(&self, account_id: AccountId) -> AuthResult<u64> {
        let closed = self.sessions.invalidate_all_for_account(account_id).await?;
        audit(
            "logout_all",
            &account_id.to_string(),
            AuditStatus::Success,
            &format!("{closed} sessions closed"),
        );
        Ok(closed)
    }

    /// Close every session of every account
    pub async fn force_logout_everyone(&self) -> AuthResult<u64> {
        let closed = self.sessions.invalidate_everything().await?;
        audit(
            "force_logout_everyone",
            "all",
            AuditStatus::Success,
            &format!("{closed} sessions closed"),
        );
        tracing::warn!(sessions_closed = closed, "Forced logout of every session");
        Ok(closed)
    }
}

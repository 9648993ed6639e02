//! Check Session
//!
//! Read-side session operations: status, refresh, self-service listing and
//! role-based authorization of a bearer token.

use crate::application::service::{AuthService, Principal, SessionStatus};
use crate::application::token_issuer::TokenError;
use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::entity::{Session, SessionSummary};
use crate::domain::repository::{AccountRepository, AuthStore};
use crate::domain::value_object::{AccountId, AccountRole};
use crate::error::{AuthError, AuthResult};

impl<R, M, G> AuthService<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    /// Report whether the token names a live session
    ///
    /// Never mutates state. A bad token is a `valid: false` status, not an
    /// error; only store failures are returned as `Err`.
    pub async fn verify_session(&self, token: &str) -> AuthResult<SessionStatus> {
        let resolved = match self.sessions.resolve(token).await {
            Ok(resolved) => resolved,
            Err(AuthError::Token(TokenError::Expired)) => {
                return Ok(SessionStatus::invalid("Session token has expired"));
            }
            Err(AuthError::Token(TokenError::Invalid)) => {
                return Ok(SessionStatus::invalid("Session token is invalid"));
            }
            Err(AuthError::SessionNotFound) => {
                return Ok(SessionStatus::invalid("Session is not active"));
            }
            Err(e) => return Err(e),
        };

        let session = resolved.session;
        let remaining = session.remaining(self.clock.now());
        let expiring_soon = remaining < self.config.expiry_warning_window;

        let message = if session.second_factor_pending {
            "Session is waiting for the second factor".to_string()
        } else if expiring_soon {
            format!(
                "Session expires in {} minutes",
                (remaining.num_seconds() + 59) / 60
            )
        } else {
            "Session is valid".to_string()
        };

        Ok(SessionStatus {
            valid: true,
            message,
            expiring_soon,
            expires_at: Some(session.expires_at),
            remaining_seconds: Some(remaining.num_seconds()),
            second_factor_pending: session.second_factor_pending,
        })
    }

    /// Extend the session named by `token` by the configured extension
    pub async fn refresh_session(&self, token: &str) -> AuthResult<SessionSummary> {
        let resolved = self.sessions.resolve(token).await?;
        if resolved.session.second_factor_pending {
            return Err(AuthError::SecondFactorRequired);
        }

        let session = self
            .sessions
            .refresh(token, self.config.session_refresh_extension)
            .await?;
        Ok(session.summary())
    }

    /// Live sessions of one account, without token material
    pub async fn get_active_sessions(&self, account_id: AccountId) -> AuthResult<Vec<SessionSummary>> {
        let sessions = self.sessions.find_active_by_account(account_id).await?;
        Ok(sessions.iter().map(Session::summary).collect())
    }

    /// Resolve a bearer token to a caller allowed to act in one of `allowed`
    ///
    /// The role is re-read from the account, so a role change takes effect
    /// on the next request rather than when the token expires.
    pub async fn authorize(&self, token: &str, allowed: &[AccountRole]) -> AuthResult<Principal> {
        let resolved = self.sessions.resolve(token).await?;
        if resolved.session.second_factor_pending {
            return Err(AuthError::SecondFactorRequired);
        }

        let account = self
            .repo
            .find_account_by_id(resolved.session.account_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !allowed.contains(&account.role) {
            tracing::warn!(
                account_id = %account.id,
                role = %account.role,
                "Role not allowed for this operation"
            );
            return Err(AuthError::Forbidden);
        }

        Ok(Principal {
            account,
            session: resolved.session,
        })
    }
}

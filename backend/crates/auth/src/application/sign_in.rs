//! Sign In
//!
//! Verifies credentials and opens a session, subject to the
//! single-active-session policy.

use platform::client::RequestOrigin;
use platform::crypto::constant_time_eq;

use crate::application::audit::{AuditStatus, audit};
use crate::application::service::{AuthService, LoginOutput};
use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::entity::Session;
use crate::domain::repository::{AccountRepository, AuthStore};
use crate::domain::value_object::Email;
use crate::error::{AuthError, AuthResult};

/// Sign in input
#[derive(Debug, Clone)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

impl<R, M, G> AuthService<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    /// Sign in
    ///
    /// Unknown email and wrong password both return `InvalidCredentials`.
    /// An existing live session returns `SessionConflict` listing it.
    pub async fn login(&self, input: SignInInput, origin: &RequestOrigin) -> AuthResult<LoginOutput> {
        let email = Email::new(input.email).map_err(|_| AuthError::InvalidCredentials)?;

        let account = match self.repo.find_account_by_email(&email).await? {
            Some(account) if account.check_password(&input.password, self.config.pepper()) => {
                account
            }
            _ => {
                audit("login", email.as_str(), AuditStatus::Failure, "invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        // Fast path before the geolocation call; the atomic insert below is
        // what actually enforces the policy
        if !self.config.allow_multiple_sessions {
            let existing = self.sessions.find_active_by_account(account.id).await?;
            if !existing.is_empty() {
                audit(
                    "login",
                    &account.id.to_string(),
                    AuditStatus::Failure,
                    "active session exists",
                );
                return Err(AuthError::SessionConflict(
                    existing.iter().map(Session::summary).collect(),
                ));
            }
        }

        let context = self.context.resolve(origin).await;
        let created = self.sessions.create(&account, context).await.inspect_err(|e| {
            if matches!(e, AuthError::SessionConflict(_)) {
                audit(
                    "login",
                    &account.id.to_string(),
                    AuditStatus::Failure,
                    "lost race to a concurrent login",
                );
            }
        })?;

        audit(
            "login",
            &account.id.to_string(),
            AuditStatus::Success,
            created.session.ip_address.as_deref().unwrap_or("unknown ip"),
        );
        tracing::info!(
            account_id = %account.id,
            session_id = %created.session.session_id,
            second_factor = account.two_factor_enabled,
            "Account signed in"
        );

        Ok(LoginOutput {
            token: created.token,
            account: account.view(),
            session: created.session.summary(),
            requires_second_factor: created.session.second_factor_pending,
        })
    }

    /// Complete the second-factor step of a pending session
    ///
    /// The code is compared with the configured one-time code; there is no
    /// OTP cryptography behind it.
    pub async fn verify_second_factor(&self, token: &str, code: &str) -> AuthResult<()> {
        let resolved = self.sessions.resolve(token).await?;
        if !resolved.session.second_factor_pending {
            return Ok(());
        }

        if !constant_time_eq(
            code.trim().as_bytes(),
            self.config.second_factor_code.as_bytes(),
        ) {
            audit(
                "second_factor",
                &resolved.session.account_id.to_string(),
                AuditStatus::Failure,
                "wrong code",
            );
            return Err(AuthError::InvalidSecondFactorCode);
        }

        self.sessions
            .confirm_second_factor(resolved.session.session_id)
            .await?;
        audit(
            "second_factor",
            &resolved.session.account_id.to_string(),
            AuditStatus::Success,
            "session confirmed",
        );
        Ok(())
    }
}

//! Authentication Service
//!
//! Orchestrates validation, accounts, sessions, tokens, client context and
//! password recovery. The operations are split by concern across
//! `sign_up.rs`, `sign_in.rs`, `sign_out.rs`, `check_session.rs` and
//! `account_admin.rs`; this file holds the wiring and the shared outputs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::client_context::ClientContextResolver;
use crate::application::config::AuthConfig;
use crate::application::password_reset::PasswordResetFlow;
use crate::application::session_registry::SessionRegistry;
use crate::application::token_issuer::TokenIssuer;
use crate::domain::clock::Clock;
use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::entity::{Account, AccountView, Session, SessionSummary};
use crate::domain::repository::AuthStore;
use crate::error::AuthResult;

/// Successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutput {
    pub token: String,
    pub account: AccountView,
    pub session: SessionSummary,
    /// The session must pass `verify_second_factor` before it is trusted
    pub requires_second_factor: bool,
}

/// Result of `verify_session`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub valid: bool,
    pub message: String,
    /// Less than the warning window remains
    pub expiring_soon: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
    pub second_factor_pending: bool,
}

impl SessionStatus {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            expiring_soon: false,
            expires_at: None,
            remaining_seconds: None,
            second_factor_pending: false,
        }
    }
}

/// Caller identity after `authorize`
#[derive(Debug, Clone)]
pub struct Principal {
    pub account: Account,
    pub session: Session,
}

/// Counts from one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_closed: u64,
    pub reset_tokens_deleted: u64,
}

pub struct AuthService<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    pub(crate) repo: Arc<R>,
    pub(crate) config: Arc<AuthConfig>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sessions: SessionRegistry<R>,
    pub(crate) resets: PasswordResetFlow<R, M>,
    pub(crate) context: ClientContextResolver<G>,
}

impl<R, M, G> AuthService<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        mailer: Arc<M>,
        geo: Arc<G>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = Arc::new(TokenIssuer::new(&config.token_secret));

        Self {
            sessions: SessionRegistry::new(
                repo.clone(),
                issuer,
                config.clone(),
                clock.clone(),
            ),
            resets: PasswordResetFlow::new(repo.clone(), mailer, config.clone(), clock.clone()),
            context: ClientContextResolver::new(geo, config.outbound_timeout),
            repo,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry<R> {
        &self.sessions
    }

    /// Housekeeping: sweep expired sessions and purge expired reset tokens
    pub async fn run_maintenance(&self) -> AuthResult<SweepReport> {
        Ok(SweepReport {
            sessions_closed: self.cleanup_expired_sessions().await?,
            reset_tokens_deleted: self.purge_expired_reset_tokens().await?,
        })
    }

    pub async fn cleanup_expired_sessions(&self) -> AuthResult<u64> {
        self.sessions.cleanup_expired().await
    }

    pub async fn purge_expired_reset_tokens(&self) -> AuthResult<u64> {
        self.resets.purge_expired().await
    }

    pub async fn recover_user(&self, email: &str) -> AuthResult<()> {
        self.resets.recover_user(email).await
    }

    pub async fn recover_password(&self, email: &str) -> AuthResult<&'static str> {
        self.resets.recover_password(email).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        self.resets.reset_password(token, new_password).await
    }
}

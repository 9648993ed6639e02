//! Session Registry
//!
//! Creates, finds, refreshes and invalidates session records. The
//! single-active-session check and the insert run as one atomic store
//! operation (`insert_session_exclusive`); nothing here caches sessions.
//!
//! Expiry is lazy: a row whose `expires_at` has passed is treated as dead on
//! every read even while `is_active` is still true. `cleanup_expired` flips
//! such rows to inactive.

use std::sync::Arc;

use chrono::Duration;
use kernel::id::SessionId;

use crate::application::config::AuthConfig;
use crate::application::token_issuer::{TokenClaims, TokenIssuer};
use crate::domain::clock::Clock;
use crate::domain::entity::{Account, Session, hash_token};
use crate::domain::repository::{SessionInsert, SessionRepository};
use crate::domain::value_object::{AccountId, ClientContext};
use crate::error::{AuthError, AuthResult};

/// A freshly created session and the token that names it
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub token: String,
    pub token_expires_at: chrono::DateTime<chrono::Utc>,
    pub session: Session,
}

/// A token that verified and whose session is live
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Session,
    pub claims: TokenClaims,
}

pub struct SessionRegistry<S>
where
    S: SessionRepository,
{
    repo: Arc<S>,
    issuer: Arc<TokenIssuer>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> SessionRegistry<S>
where
    S: SessionRepository,
{
    pub fn new(
        repo: Arc<S>,
        issuer: Arc<TokenIssuer>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            issuer,
            config,
            clock,
        }
    }

    /// Live sessions of one account
    pub async fn find_active_by_account(&self, account_id: AccountId) -> AuthResult<Vec<Session>> {
        self.repo
            .find_active_sessions_for_account(account_id, self.clock.now())
            .await
    }

    /// Issue a token and insert its session, honoring the single-session policy
    ///
    /// Returns `SessionConflict` with the blocking sessions when the account
    /// already has a live session and multiple sessions are disallowed.
    pub async fn create(
        &self,
        account: &Account,
        context: ClientContext,
    ) -> AuthResult<CreatedSession> {
        let now = self.clock.now();
        let session_id = SessionId::new();

        let issued = self.issuer.issue(
            account.id,
            &account.email,
            account.role,
            session_id,
            self.config.token_ttl,
            now,
        )?;

        // A session never outlives its token
        let ttl = self.config.session_ttl.min(issued.expires_at - now);
        let session = Session::new(
            session_id,
            account.id,
            &issued.token,
            context,
            now,
            ttl,
            account.two_factor_enabled,
        );

        match self
            .repo
            .insert_session_exclusive(&session, self.config.allow_multiple_sessions, now)
            .await?
        {
            SessionInsert::Created => {
                tracing::info!(
                    account_id = %account.id,
                    session_id = %session.session_id,
                    expires_at = %session.expires_at,
                    "Session created"
                );
                Ok(CreatedSession {
                    token: issued.token,
                    token_expires_at: issued.expires_at,
                    session,
                })
            }
            SessionInsert::Blocked(existing) => Err(AuthError::SessionConflict(
                existing.iter().map(Session::summary).collect(),
            )),
        }
    }

    /// Verify the token and load its live session
    ///
    /// `Token(..)` when the token itself is bad, `SessionNotFound` when it
    /// verifies but its session is unknown, closed or expired.
    pub async fn resolve(&self, token: &str) -> AuthResult<ResolvedSession> {
        let now = self.clock.now();
        let claims = self.issuer.decode(token, now)?;

        let session = self
            .repo
            .find_session_by_token_hash(&hash_token(token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.session_id != claims.session_id || session.account_id != claims.account_id {
            tracing::warn!(
                session_id = %session.session_id,
                "Token claims do not match the stored session"
            );
            return Err(AuthError::SessionNotFound);
        }

        if !session.is_live(now) {
            return Err(AuthError::SessionNotFound);
        }

        Ok(ResolvedSession { session, claims })
    }

    /// Live session for a token, `None` if the token is bad or the session dead
    pub async fn find_by_token(&self, token: &str) -> AuthResult<Option<Session>> {
        match self.resolve(token).await {
            Ok(resolved) => Ok(Some(resolved.session)),
            Err(AuthError::Token(_) | AuthError::SessionNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Push the expiry out by `extension` from now, capped by the token's expiry
    pub async fn refresh(&self, token: &str, extension: Duration) -> AuthResult<Session> {
        let ResolvedSession {
            mut session,
            claims,
        } = self.resolve(token).await?;
        let now = self.clock.now();

        let expires_at = session.refreshed_expiry(now, extension, claims.expires_at);
        if !self
            .repo
            .extend_session(session.session_id, expires_at, now)
            .await?
        {
            // closed between resolve and update
            return Err(AuthError::SessionNotFound);
        }

        session.expires_at = expires_at;
        session.last_activity_at = now;

        tracing::debug!(
            session_id = %session.session_id,
            expires_at = %expires_at,
            "Session refreshed"
        );
        Ok(session)
    }

    /// Close the session named by `token`
    ///
    /// Idempotent: a session that is already closed or expired reports
    /// `SessionNotFound` and nothing changes.
    pub async fn invalidate(&self, token: &str) -> AuthResult<()> {
        let closed = self
            .repo
            .deactivate_session_by_token_hash(&hash_token(token), self.clock.now())
            .await?;

        if closed {
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    pub async fn invalidate_all_for_account(&self, account_id: AccountId) -> AuthResult<u64> {
        self.repo.deactivate_sessions_for_account(account_id).await
    }

    pub async fn invalidate_everything(&self) -> AuthResult<u64> {
        self.repo.deactivate_all_sessions().await
    }

    pub async fn list_all_active(&self) -> AuthResult<Vec<Session>> {
        self.repo.list_all_active_sessions(self.clock.now()).await
    }

    pub async fn confirm_second_factor(&self, session_id: SessionId) -> AuthResult<()> {
        if self
            .repo
            .confirm_session_second_factor(session_id, self.clock.now())
            .await?
        {
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    /// Sweep expired-but-active rows to inactive; safe to run concurrently
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let swept = self
            .repo
            .deactivate_expired_sessions(self.clock.now())
            .await?;
        if swept > 0 {
            tracing::info!(sessions_closed = swept, "Swept expired sessions");
        }
        Ok(swept)
    }
}

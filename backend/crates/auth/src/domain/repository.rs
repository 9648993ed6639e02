//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the infrastructure
//! layer. Method names are unique across traits so one store type can
//! implement all of them without ambiguous calls.

use chrono::{DateTime, Utc};
use kernel::id::SessionId;

use crate::domain::entity::{Account, NewAccount, PasswordResetToken, Session};
use crate::domain::value_object::{AccountId, AccountRole, Email};
use crate::error::AuthResult;

/// Outcome of an exclusive session insert
#[derive(Debug, Clone)]
pub enum SessionInsert {
    Created,
    /// Live sessions that prevented the insert
    Blocked(Vec<Session>),
}

/// Account repository trait
#[trait_variant::make(AccountRepository: Send)]
pub trait LocalAccountRepository {
    /// Insert an account; `EmailTaken` when the unique email constraint fires
    async fn create_account(&self, account: &NewAccount) -> AuthResult<Account>;

    async fn find_account_by_email(&self, email: &Email) -> AuthResult<Option<Account>>;

    async fn find_account_by_id(&self, account_id: AccountId) -> AuthResult<Option<Account>>;

    /// Write name, email, password hash, role and 2FA fields; `None` if missing
    async fn update_account(&self, account: &Account) -> AuthResult<Option<Account>>;

    async fn set_account_role(&self, account_id: AccountId, role: AccountRole) -> AuthResult<bool>;

    async fn delete_account(&self, account_id: AccountId) -> AuthResult<bool>;

    async fn list_accounts(&self) -> AuthResult<Vec<Account>>;
}

/// Session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Check for live sessions of the owner and insert as one atomic unit
    ///
    /// With `allow_multiple == false` the insert only happens when the owner
    /// has no session that is active and unexpired at `now`.
    async fn insert_session_exclusive(
        &self,
        session: &Session,
        allow_multiple: bool,
        now: DateTime<Utc>,
    ) -> AuthResult<SessionInsert>;

    async fn find_session_by_token_hash(&self, token_hash: &[u8]) -> AuthResult<Option<Session>>;

    /// Active and unexpired at `now`, oldest first
    async fn find_active_sessions_for_account(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>>;

    async fn list_all_active_sessions(&self, now: DateTime<Utc>) -> AuthResult<Vec<Session>>;

    /// Move `expires_at` and touch `last_activity_at`, only if still live
    async fn extend_session(
        &self,
        session_id: SessionId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Clear `second_factor_pending`, only if still live
    async fn confirm_session_second_factor(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Live session with this token hash -> inactive; false if none
    async fn deactivate_session_by_token_hash(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    async fn deactivate_sessions_for_account(&self, account_id: AccountId) -> AuthResult<u64>;

    async fn deactivate_all_sessions(&self) -> AuthResult<u64>;

    /// Sweep: active rows with `expires_at <= now` -> inactive
    async fn deactivate_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Password reset token repository trait
#[trait_variant::make(PasswordResetRepository: Send)]
pub trait LocalPasswordResetRepository {
    async fn insert_reset_token(&self, token: &PasswordResetToken) -> AuthResult<()>;

    async fn find_reset_token(&self, token_hash: &[u8]) -> AuthResult<Option<PasswordResetToken>>;

    /// Delete and return the row; `None` if another caller consumed it first
    async fn take_reset_token(&self, token_hash: &[u8]) -> AuthResult<Option<PasswordResetToken>>;

    async fn delete_expired_reset_tokens(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Everything the authentication service persists
pub trait AuthStore:
    AccountRepository + SessionRepository + PasswordResetRepository + Send + Sync + 'static
{
}

impl<T> AuthStore for T where
    T: AccountRepository + SessionRepository + PasswordResetRepository + Send + Sync + 'static
{
}

//! In-memory store
//!
//! Implements every repository trait over one mutex, so a check and the
//! write that depends on it happen under the same lock, matching the
//! transactional guarantees of the PostgreSQL store. Used by tests and by
//! local runs without a database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use kernel::id::SessionId;

use crate::domain::entity::{Account, NewAccount, PasswordResetToken, Session};
use crate::domain::repository::{
    AccountRepository, PasswordResetRepository, SessionInsert, SessionRepository,
};
use crate::domain::value_object::{AccountId, AccountRole, Email};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct State {
    next_account_id: i64,
    accounts: HashMap<AccountId, Account>,
    sessions: Vec<Session>,
    reset_tokens: Vec<PasswordResetToken>,
}

#[derive(Default)]
pub struct InMemoryAuthStore {
    state: Mutex<State>,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session rows in any state
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn reset_token_count(&self) -> usize {
        self.lock().reset_tokens.len()
    }
}

fn live_for(sessions: &[Session], account_id: AccountId, now: DateTime<Utc>) -> Vec<Session> {
    let mut live: Vec<Session> = sessions
        .iter()
        .filter(|s| s.account_id == account_id && s.is_live(now))
        .cloned()
        .collect();
    live.sort_by_key(|s| s.created_at);
    live
}

impl AccountRepository for InMemoryAuthStore {
    async fn create_account(&self, account: &NewAccount) -> AuthResult<Account> {
        let mut state = self.lock();
        if state.accounts.values().any(|a| a.email == account.email) {
            return Err(AuthError::EmailTaken);
        }

        state.next_account_id += 1;
        let now = Utc::now();
        let created = Account {
            id: AccountId::new(state.next_account_id),
            name: account.name.clone(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            role: account.role,
            two_factor_enabled: false,
            two_factor_secret: None,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_account_by_email(&self, email: &Email) -> AuthResult<Option<Account>> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|a| &a.email == email)
            .cloned())
    }

    async fn find_account_by_id(&self, account_id: AccountId) -> AuthResult<Option<Account>> {
        Ok(self.lock().accounts.get(&account_id).cloned())
    }

    async fn update_account(&self, account: &Account) -> AuthResult<Option<Account>> {
        let mut state = self.lock();
        if state
            .accounts
            .values()
            .any(|a| a.id != account.id && a.email == account.email)
        {
            return Err(AuthError::EmailTaken);
        }

        let Some(stored) = state.accounts.get_mut(&account.id) else {
            return Ok(None);
        };
        let previous_email = stored.email.clone();
        stored.name = account.name.clone();
        stored.email = account.email.clone();
        stored.password_hash = account.password_hash.clone();
        stored.role = account.role;
        stored.two_factor_enabled = account.two_factor_enabled;
        stored.two_factor_secret = account.two_factor_secret.clone();
        stored.updated_at = Utc::now();
        let updated = stored.clone();

        // reset tokens follow the email, as ON UPDATE CASCADE does
        for token in state
            .reset_tokens
            .iter_mut()
            .filter(|t| t.email == previous_email)
        {
            token.email = updated.email.clone();
        }
        Ok(Some(updated))
    }

    async fn set_account_role(&self, account_id: AccountId, role: AccountRole) -> AuthResult<bool> {
        let mut state = self.lock();
        match state.accounts.get_mut(&account_id) {
            Some(account) => {
                account.role = role;
                account.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_account(&self, account_id: AccountId) -> AuthResult<bool> {
        let mut state = self.lock();
        let Some(account) = state.accounts.remove(&account_id) else {
            return Ok(false);
        };
        // cascade, as the foreign keys do in PostgreSQL
        state.sessions.retain(|s| s.account_id != account_id);
        state.reset_tokens.retain(|t| t.email != account.email);
        Ok(true)
    }

    async fn list_accounts(&self) -> AuthResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self.lock().accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.id.value());
        Ok(accounts)
    }
}

impl SessionRepository for InMemoryAuthStore {
    async fn insert_session_exclusive(
        &self,
        session: &Session,
        allow_multiple: bool,
        now: DateTime<Utc>,
    ) -> AuthResult<SessionInsert> {
        let mut state = self.lock();
        if !allow_multiple {
            let live = live_for(&state.sessions, session.account_id, now);
            if !live.is_empty() {
                return Ok(SessionInsert::Blocked(live));
            }
        }
        state.sessions.push(session.clone());
        Ok(SessionInsert::Created)
    }

    async fn find_session_by_token_hash(&self, token_hash: &[u8]) -> AuthResult<Option<Session>> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn find_active_sessions_for_account(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        Ok(live_for(&self.lock().sessions, account_id, now))
    }

    async fn list_all_active_sessions(&self, now: DateTime<Utc>) -> AuthResult<Vec<Session>> {
        let mut live: Vec<Session> = self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.is_live(now))
            .cloned()
            .collect();
        live.sort_by_key(|s| s.created_at);
        Ok(live)
    }

    async fn extend_session(
        &self,
        session_id: SessionId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.lock();
        match state
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id && s.is_live(now))
        {
            Some(session) => {
                session.expires_at = expires_at;
                session.last_activity_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn confirm_session_second_factor(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.lock();
        match state
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id && s.is_live(now))
        {
            Some(session) => {
                session.second_factor_pending = false;
                session.last_activity_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate_session_by_token_hash(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.lock();
        match state
            .sessions
            .iter_mut()
            .find(|s| s.token_hash == token_hash && s.is_live(now))
        {
            Some(session) => {
                session.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate_sessions_for_account(&self, account_id: AccountId) -> AuthResult<u64> {
        let mut state = self.lock();
        let mut closed = 0;
        for session in state
            .sessions
            .iter_mut()
            .filter(|s| s.account_id == account_id && s.is_active)
        {
            session.is_active = false;
            closed += 1;
        }
        Ok(closed)
    }

    async fn deactivate_all_sessions(&self) -> AuthResult<u64> {
        let mut state = self.lock();
        let mut closed = 0;
        for session in state.sessions.iter_mut().filter(|s| s.is_active) {
            session.is_active = false;
            closed += 1;
        }
        Ok(closed)
    }

    async fn deactivate_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.lock();
        let mut swept = 0;
        for session in state
            .sessions
            .iter_mut()
            .filter(|s| s.is_active && s.expires_at <= now)
        {
            session.is_active = false;
            swept += 1;
        }
        Ok(swept)
    }
}

impl PasswordResetRepository for InMemoryAuthStore {
    async fn insert_reset_token(&self, token: &PasswordResetToken) -> AuthResult<()> {
        self.lock().reset_tokens.push(token.clone());
        Ok(())
    }

    async fn find_reset_token(&self, token_hash: &[u8]) -> AuthResult<Option<PasswordResetToken>> {
        Ok(self
            .lock()
            .reset_tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn take_reset_token(&self, token_hash: &[u8]) -> AuthResult<Option<PasswordResetToken>> {
        let mut state = self.lock();
        let position = state
            .reset_tokens
            .iter()
            .position(|t| t.token_hash == token_hash);
        Ok(position.map(|i| state.reset_tokens.swap_remove(i)))
    }

    async fn delete_expired_reset_tokens(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.lock();
        let before = state.reset_tokens.len();
        state.reset_tokens.retain(|t| !t.is_expired(now));
        Ok((before - state.reset_tokens.len()) as u64)
    }
}

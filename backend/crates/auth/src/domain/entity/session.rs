//! Session Entity
//!
//! Server-side record of a logged-in state, bound to one signed token.
//!
//! ```text
//! (login) --> Active --refresh--> Active (expires_at moved)
//!               |  \
//!               |   `--expires_at <= now--> Expired --sweep--> Invalidated
//!               `--logout / logout-all--------------------> Invalidated
//! ```

use chrono::{DateTime, Duration, Utc};
use kernel::id::SessionId;
use platform::crypto::sha256;
use serde::Serialize;

use crate::domain::value_object::{AccountId, ClientContext, Location};

/// Session entity
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID (UUID v4), also the token's `jti`
    pub session_id: SessionId,
    pub account_id: AccountId,
    /// SHA-256 of the issued token; the token itself is never stored
    pub token_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Location,
    pub last_activity_at: DateTime<Utc>,
    /// Set while the account's second factor has not been confirmed
    pub second_factor_pending: bool,
}

/// Observable lifecycle state at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Still flagged active but past `expires_at`
    Expired,
    Invalidated,
}

impl Session {
    pub fn new(
        session_id: SessionId,
        account_id: AccountId,
        token: &str,
        context: ClientContext,
        now: DateTime<Utc>,
        ttl: Duration,
        second_factor_pending: bool,
    ) -> Self {
        // expires_at must stay strictly after created_at
        let ttl = ttl.max(Duration::seconds(1));

        Self {
            session_id,
            account_id,
            token_hash: hash_token(token),
            created_at: now,
            expires_at: now + ttl,
            is_active: true,
            ip_address: context.ip_address,
            user_agent: context.user_agent,
            location: context.location,
            last_activity_at: now,
            second_factor_pending,
        }
    }

    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        if !self.is_active {
            SessionState::Invalidated
        } else if self.expires_at <= now {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    #[inline]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == SessionState::Active
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    /// Expiry after a refresh at `now`
    ///
    /// Never shortens the session and never goes past `cap` (the expiry
    /// embedded in the token that names it).
    pub fn refreshed_expiry(
        &self,
        now: DateTime<Utc>,
        extension: Duration,
        cap: DateTime<Utc>,
    ) -> DateTime<Utc> {
        (now + extension).min(cap).max(self.expires_at)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            account_id: self.account_id,
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            location: self.location.clone(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            expires_at: self.expires_at,
        }
    }
}

/// SHA-256 digest used to look a session up by its token
pub fn hash_token(token: &str) -> Vec<u8> {
    sha256(token.as_bytes()).to_vec()
}

/// Session info for API responses (never includes the token)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub account_id: AccountId,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Location,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(now: DateTime<Utc>) -> Session {
        Session::new(
            SessionId::new(),
            AccountId::new(7),
            "token-a",
            ClientContext::default(),
            now,
            Duration::hours(1),
            false,
        )
    }

    #[test]
    fn test_state_transitions() {
        let now = Utc::now();
        let mut s = session(now);
        assert!(s.expires_at > s.created_at);
        assert_eq!(s.state(now), SessionState::Active);
        assert_eq!(s.state(now + Duration::hours(1)), SessionState::Expired);

        s.is_active = false;
        assert_eq!(s.state(now), SessionState::Invalidated);
    }

    #[test]
    fn test_token_is_hashed() {
        let s = session(Utc::now());
        assert_eq!(s.token_hash, hash_token("token-a"));
        assert_ne!(s.token_hash, b"token-a".to_vec());
    }

    #[test]
    fn test_refresh_is_capped_and_monotonic() {
        let now = Utc::now();
        let s = session(now);
        let cap = now + Duration::hours(24);

        let later = now + Duration::minutes(30);
        assert_eq!(
            s.refreshed_expiry(later, Duration::hours(1), cap),
            later + Duration::hours(1)
        );

        // cap wins over the extension
        let near_cap = now + Duration::minutes(50);
        assert_eq!(s.refreshed_expiry(near_cap, Duration::hours(1), now + Duration::minutes(55)), s.expires_at);

        // never shortened
        assert_eq!(s.refreshed_expiry(now, Duration::minutes(5), cap), s.expires_at);
    }

    #[test]
    fn test_remaining_never_negative() {
        let now = Utc::now();
        let s = session(now);
        assert_eq!(s.remaining(now + Duration::hours(3)), Duration::zero());
        assert_eq!(s.remaining(now), Duration::hours(1));
    }
}

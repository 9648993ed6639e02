//! Password Reset Token Entity
//!
//! Single-use, time-boxed permission to set a new password. Consuming it
//! deletes the row; it is never updated in place.

use chrono::{DateTime, Duration, Utc};

use crate::domain::entity::session::hash_token;
use crate::domain::value_object::Email;

#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    /// Several outstanding tokens per email are allowed
    pub email: Email,
    /// SHA-256 of the emailed token
    pub token_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(email: Email, token: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            email,
            token_hash: hash_token(token),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

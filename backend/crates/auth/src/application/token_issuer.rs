//! Session token signing and verification
//!
//! Tokens are HS256-signed JWTs. The `jti` claim is the session id, so a
//! token names exactly one server-side session. A token that verifies is
//! necessary but not sufficient: callers must still find its session live.
//!
//! Expiry is checked against the injected clock rather than the system time.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use kernel::id::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_object::{AccountId, AccountRole, Email};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token is malformed or its signature is invalid")]
    Invalid,
}

/// Wire claims
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    role: String,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Verified, typed claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub account_id: AccountId,
    pub email: String,
    pub role: AccountRole,
    pub session_id: SessionId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is compared with the injected clock in `decode`
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(
        &self,
        account_id: AccountId,
        email: &Email,
        role: AccountRole,
        session_id: SessionId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        let iat = now.timestamp();
        let exp = iat + ttl.num_seconds().max(1);

        let claims = Claims {
            sub: account_id.to_string(),
            email: email.as_str().to_string(),
            role: role.code().to_string(),
            iat,
            exp,
            jti: session_id.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token signing failed: {e}")))?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::Internal("Token expiry out of range".to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        let claims = data.claims;

        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(TokenClaims {
            account_id: claims.sub.parse().map_err(|_| TokenError::Invalid)?,
            role: AccountRole::from_code(&claims.role).ok_or(TokenError::Invalid)?,
            session_id: claims.jti.parse().map_err(|_| TokenError::Invalid)?,
            issued_at: DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Invalid)?,
            expires_at: DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid)?,
            email: claims.email,
        })
    }
}

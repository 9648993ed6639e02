//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use kernel::id::SessionId;
use platform::password::HashedPassword;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{Account, NewAccount, PasswordResetToken, Session};
use crate::domain::repository::{
    AccountRepository, PasswordResetRepository, SessionInsert, SessionRepository,
};
use crate::domain::value_object::{AccountId, AccountRole, Email, Location};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth store
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a unique-constraint violation on the email column to `EmailTaken`
fn map_email_conflict(e: sqlx::Error) -> AuthError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::EmailTaken,
        _ => AuthError::Database(e),
    }
}

const ACCOUNT_COLUMNS: &str = r#"
    id,
    name,
    email,
    password_hash,
    role,
    two_factor_enabled,
    two_factor_secret,
    created_at,
    updated_at
"#;

const SESSION_COLUMNS: &str = r#"
    session_id,
    account_id,
    token_hash,
    created_at,
    expires_at,
    is_active,
    ip_address,
    user_agent,
    location,
    last_activity_at,
    second_factor_pending
"#;

// ============================================================================
// Account Repository Implementation
// ============================================================================

impl AccountRepository for PgAuthStore {
    async fn create_account(&self, account: &NewAccount) -> AuthResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&account.name)
        .bind(account.email.as_str())
        .bind(account.password_hash.as_phc_string())
        .bind(account.role.code())
        .fetch_one(&self.pool)
        .await
        .map_err(map_email_conflict)?;

        row.into_account()
    }

    async fn find_account_by_email(&self, email: &Email) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_account()).transpose()
    }

    async fn find_account_by_id(&self, account_id: AccountId) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(account_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_account()).transpose()
    }

    async fn update_account(&self, account: &Account) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts SET
                name = $2,
                email = $3,
                password_hash = $4,
                role = $5,
                two_factor_enabled = $6,
                two_factor_secret = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id.value())
        .bind(&account.name)
        .bind(account.email.as_str())
        .bind(account.password_hash.as_phc_string())
        .bind(account.role.code())
        .bind(account.two_factor_enabled)
        .bind(&account.two_factor_secret)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_email_conflict)?;

        row.map(|r| r.into_account()).transpose()
    }

    async fn set_account_role(&self, account_id: AccountId, role: AccountRole) -> AuthResult<bool> {
        let updated = sqlx::query("UPDATE accounts SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(account_id.value())
            .bind(role.code())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(updated > 0)
    }

    async fn delete_account(&self, account_id: AccountId) -> AuthResult<bool> {
        // sessions and reset tokens go with it (ON DELETE CASCADE)
        let deleted = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id.value())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn list_accounts(&self) -> AuthResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_account()).collect()
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl PgAuthStore {
    async fn live_sessions_in(
        tx: &mut Transaction<'_, Postgres>,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE account_id = $1 AND is_active AND expires_at > $2
            ORDER BY created_at
            "#
        ))
        .bind(account_id.value())
        .bind(now)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }
}

impl SessionRepository for PgAuthStore {
    async fn insert_session_exclusive(
        &self,
        session: &Session,
        allow_multiple: bool,
        now: DateTime<Utc>,
    ) -> AuthResult<SessionInsert> {
        let mut tx = self.pool.begin().await?;

        // The account row lock serializes concurrent logins of one account
        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(session.account_id.value())
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AuthError::AccountNotFound);
        }

        if !allow_multiple {
            let live = Self::live_sessions_in(&mut tx, session.account_id, now).await?;
            if !live.is_empty() {
                tx.rollback().await?;
                return Ok(SessionInsert::Blocked(live));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id,
                account_id,
                token_hash,
                created_at,
                expires_at,
                is_active,
                ip_address,
                user_agent,
                location,
                last_activity_at,
                second_factor_pending
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.session_id.into_uuid())
        .bind(session.account_id.value())
        .bind(&session.token_hash)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.is_active)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(Json(&session.location))
        .bind(session.last_activity_at)
        .bind(session.second_factor_pending)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(SessionInsert::Created)
    }

    async fn find_session_by_token_hash(&self, token_hash: &[u8]) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRow::into_session))
    }

    async fn find_active_sessions_for_account(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE account_id = $1 AND is_active AND expires_at > $2
            ORDER BY created_at
            "#
        ))
        .bind(account_id.value())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }

    async fn list_all_active_sessions(&self, now: DateTime<Utc>) -> AuthResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE is_active AND expires_at > $1
            ORDER BY created_at
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }

    async fn extend_session(
        &self,
        session_id: SessionId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE sessions SET
                expires_at = $2,
                last_activity_at = $3
            WHERE session_id = $1 AND is_active AND expires_at > $3
            "#,
        )
        .bind(session_id.into_uuid())
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn confirm_session_second_factor(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE sessions SET
                second_factor_pending = FALSE,
                last_activity_at = $2
            WHERE session_id = $1 AND is_active AND expires_at > $2
            "#,
        )
        .bind(session_id.into_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn deactivate_session_by_token_hash(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE sessions SET is_active = FALSE
            WHERE token_hash = $1 AND is_active AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn deactivate_sessions_for_account(&self, account_id: AccountId) -> AuthResult<u64> {
        let updated =
            sqlx::query("UPDATE sessions SET is_active = FALSE WHERE account_id = $1 AND is_active")
                .bind(account_id.value())
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(updated)
    }

    async fn deactivate_all_sessions(&self) -> AuthResult<u64> {
        let updated = sqlx::query("UPDATE sessions SET is_active = FALSE WHERE is_active")
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(updated)
    }

    async fn deactivate_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let updated = sqlx::query(
            "UPDATE sessions SET is_active = FALSE WHERE is_active AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated)
    }
}

// ============================================================================
// Password Reset Repository Implementation
// ============================================================================

impl PasswordResetRepository for PgAuthStore {
    async fn insert_reset_token(&self, token: &PasswordResetToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (
                token_hash,
                email,
                created_at,
                expires_at
            ) VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.email.as_str())
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_reset_token(&self, token_hash: &[u8]) -> AuthResult<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            r#"
            SELECT token_hash, email, created_at, expires_at
            FROM password_reset_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ResetTokenRow::into_token))
    }

    async fn take_reset_token(&self, token_hash: &[u8]) -> AuthResult<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            r#"
            DELETE FROM password_reset_tokens
            WHERE token_hash = $1
            RETURNING token_hash, email, created_at, expires_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ResetTokenRow::into_token))
    }

    async fn delete_expired_reset_tokens(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> AuthResult<Account> {
        let password_hash = HashedPassword::from_phc_string(self.password_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash for account {}: {}", self.id, e)))?;

        Ok(Account {
            id: AccountId::new(self.id),
            name: self.name,
            email: Email::from_db(self.email),
            password_hash,
            role: AccountRole::from_stored(&self.role),
            two_factor_enabled: self.two_factor_enabled,
            two_factor_secret: self.two_factor_secret,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    account_id: i64,
    token_hash: Vec<u8>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_active: bool,
    ip_address: Option<String>,
    user_agent: Option<String>,
    location: Option<Json<Location>>,
    last_activity_at: DateTime<Utc>,
    second_factor_pending: bool,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            session_id: SessionId::from_uuid(self.session_id),
            account_id: AccountId::new(self.account_id),
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            location: self.location.map(|l| l.0).unwrap_or_default(),
            last_activity_at: self.last_activity_at,
            second_factor_pending: self.second_factor_pending,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResetTokenRow {
    token_hash: Vec<u8>,
    email: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ResetTokenRow {
    fn into_token(self) -> PasswordResetToken {
        PasswordResetToken {
            email: Email::from_db(self.email),
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

//! Password Reset Flow
//!
//! ```text
//! Requested --(account exists)--> Issued --reset--> Consumed (row deleted)
//!                                    `--window passes--> Expired (rejected, purged)
//! ```
//!
//! The token row is deleted atomically when consumed, so two concurrent
//! resets with the same token cannot both succeed. Emails are best effort:
//! they are sent after the durable change and their failure is only logged.

use std::sync::Arc;

use platform::crypto::random_token;
use platform::password::{ClearTextPassword, HashedPassword};

use crate::application::audit::{AuditStatus, audit};
use crate::application::config::AuthConfig;
use crate::application::token_issuer::TokenError;
use crate::domain::clock::Clock;
use crate::domain::collaborator::{EmailMessage, EmailSender};
use crate::domain::entity::{PasswordResetToken, hash_token};
use crate::domain::repository::{AccountRepository, PasswordResetRepository};
use crate::domain::validator::validate_new_password;
use crate::domain::value_object::Email;
use crate::error::{AuthError, AuthResult};

/// Same answer whether or not the email is registered
pub const RECOVERY_ACKNOWLEDGEMENT: &str =
    "If the email is registered, password reset instructions have been sent";

pub struct PasswordResetFlow<R, M>
where
    R: AccountRepository + PasswordResetRepository,
    M: EmailSender,
{
    repo: Arc<R>,
    mailer: Arc<M>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R, M> PasswordResetFlow<R, M>
where
    R: AccountRepository + PasswordResetRepository,
    M: EmailSender + Sync,
{
    pub fn new(
        repo: Arc<R>,
        mailer: Arc<M>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            mailer,
            config,
            clock,
        }
    }

    /// Issue and email a reset token if the account exists
    ///
    /// Always returns [`RECOVERY_ACKNOWLEDGEMENT`]; only a store failure is
    /// reported as an error.
    pub async fn recover_password(&self, email: &str) -> AuthResult<&'static str> {
        let Ok(email) = Email::new(email) else {
            return Ok(RECOVERY_ACKNOWLEDGEMENT);
        };

        let Some(account) = self.repo.find_account_by_email(&email).await? else {
            audit("recover_password", email.as_str(), AuditStatus::Failure, "unknown email");
            return Ok(RECOVERY_ACKNOWLEDGEMENT);
        };

        let token = random_token(self.config.reset_token_bytes);
        let record = PasswordResetToken::new(
            account.email.clone(),
            &token,
            self.clock.now(),
            self.config.reset_token_ttl,
        );
        self.repo.insert_reset_token(&record).await?;

        let body = format!(
            "Hello {},\n\nUse this link to choose a new password. It expires in {} minutes.\n\n{}\n\nIf you did not ask for this, ignore this email.",
            account.name,
            self.config.reset_token_ttl.num_minutes(),
            self.config.reset_link(&token),
        );
        self.deliver(&EmailMessage::new(account.email.as_str(), "Password reset", body))
            .await;

        audit(
            "recover_password",
            &account.id.to_string(),
            AuditStatus::Success,
            "reset token issued",
        );
        Ok(RECOVERY_ACKNOWLEDGEMENT)
    }

    /// Consume a reset token and set a new password
    ///
    /// Unknown or spent token -> `ResetTokenNotFound`; past its window ->
    /// `Token(Expired)` and the row is purged; weak password ->
    /// `Validation`, token left usable.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        let token_hash = hash_token(token.trim());

        let record = self
            .repo
            .find_reset_token(&token_hash)
            .await?
            .ok_or(AuthError::ResetTokenNotFound)?;

        if record.is_expired(self.clock.now()) {
            self.repo.take_reset_token(&token_hash).await?;
            audit(
                "reset_password",
                record.email.as_str(),
                AuditStatus::Failure,
                "expired token",
            );
            return Err(AuthError::Token(TokenError::Expired));
        }

        // Anything that can fail on the new password fails before the token is spent
        let password_hash = self.hash_new_password(new_password)?;

        // Single use: whoever deletes the row owns the reset
        let record = self
            .repo
            .take_reset_token(&token_hash)
            .await?
            .ok_or(AuthError::ResetTokenNotFound)?;

        let mut account = self
            .repo
            .find_account_by_email(&record.email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        account.password_hash = password_hash;
        let account = self
            .repo
            .update_account(&account)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        audit(
            "reset_password",
            &account.id.to_string(),
            AuditStatus::Success,
            "password updated",
        );

        self.deliver(&EmailMessage::new(
            account.email.as_str(),
            "Your password was changed",
            format!(
                "Hello {},\n\nThe password for your account was just changed. If this was not you, contact an administrator.",
                account.name
            ),
        ))
        .await;

        Ok(())
    }

    /// Email the display name to the account owner
    pub async fn recover_user(&self, email: &str) -> AuthResult<()> {
        let email = Email::new(email)?;
        let account = self
            .repo
            .find_account_by_email(&email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        self.deliver(&EmailMessage::new(
            account.email.as_str(),
            "Your username",
            format!("Your username is: {}", account.name),
        ))
        .await;

        audit(
            "recover_user",
            &account.id.to_string(),
            AuditStatus::Success,
            "username reminder sent",
        );
        Ok(())
    }

    fn hash_new_password(&self, new_password: &str) -> AuthResult<HashedPassword> {
        validate_new_password(new_password).map_err(AuthError::Validation)?;
        Ok(ClearTextPassword::new(new_password).hash(self.config.pepper())?)
    }

    pub async fn purge_expired(&self) -> AuthResult<u64> {
        let purged = self
            .repo
            .delete_expired_reset_tokens(self.clock.now())
            .await?;
        if purged > 0 {
            tracing::info!(reset_tokens_deleted = purged, "Purged expired reset tokens");
        }
        Ok(purged)
    }

    /// Send with a timeout; failures are logged, never returned
    async fn deliver(&self, message: &EmailMessage) -> bool {
        match tokio::time::timeout(self.config.outbound_timeout, self.mailer.send_email(message))
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                AuthError::from(e).log();
                false
            }
            Err(_) => {
                tracing::warn!(subject = %message.subject, "Email delivery timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::entity::NewAccount;
    use crate::domain::value_object::AccountRole;
    use crate::infra::mail::RecordingEmailSender;
    use crate::infra::memory::InMemoryAuthStore;
    use chrono::{Duration, Utc};

    struct Fixture {
        store: Arc<InMemoryAuthStore>,
        mailer: Arc<RecordingEmailSender>,
        clock: Arc<ManualClock>,
        flow: PasswordResetFlow<InMemoryAuthStore, RecordingEmailSender>,
    }

    async fn fixture(mailer: RecordingEmailSender) -> Fixture {
        let store = Arc::new(InMemoryAuthStore::new());
        let mailer = Arc::new(mailer);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = Arc::new(AuthConfig {
            reset_link_base: "https://pos.example.com/reset-password".to_string(),
            ..AuthConfig::development()
        });
        store
            .create_account(&NewAccount {
                name: "Jane".to_string(),
                email: Email::new("jane@x.com").unwrap(),
                password_hash: ClearTextPassword::new("Sup3r$ecret").hash(None).unwrap(),
                role: AccountRole::StandardUser,
            })
            .await
            .unwrap();
        let flow = PasswordResetFlow::new(store.clone(), mailer.clone(), config, clock.clone());

        Fixture {
            store,
            mailer,
            clock,
            flow,
        }
    }

    fn token_from(body: &str) -> String {
        body.lines()
            .find_map(|l| l.strip_prefix("https://pos.example.com/reset-password/"))
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_unknown_email_gets_same_answer_and_no_mail() {
        let f = fixture(RecordingEmailSender::new()).await;
        let known = f.flow.recover_password("jane@x.com").await.unwrap();
        let unknown = f.flow.recover_password("ghost@x.com").await.unwrap();
        let malformed = f.flow.recover_password("not-an-email").await.unwrap();

        assert_eq!(known, unknown);
        assert_eq!(known, malformed);
        assert_eq!(f.mailer.sent().len(), 1);
        assert_eq!(f.store.reset_token_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_consumes_token_once() {
        let f = fixture(RecordingEmailSender::new()).await;
        f.flow.recover_password("jane@x.com").await.unwrap();
        let token = token_from(&f.mailer.sent()[0].body);
        assert_eq!(token.len(), 43);

        f.flow.reset_password(&token, "N3w$ecretPass").await.unwrap();
        assert!(matches!(
            f.flow.reset_password(&token, "An0ther$ecret").await,
            Err(AuthError::ResetTokenNotFound)
        ));

        let account = f
            .store
            .find_account_by_email(&Email::new("jane@x.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(account.check_password("N3w$ecretPass", None));
        // reset link + password-changed notice
        assert_eq!(f.mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_expired_token_leaves_password_unchanged() {
        let f = fixture(RecordingEmailSender::new()).await;
        f.flow.recover_password("jane@x.com").await.unwrap();
        let token = token_from(&f.mailer.sent()[0].body);

        f.clock.advance(Duration::minutes(31));
        assert!(matches!(
            f.flow.reset_password(&token, "N3w$ecretPass").await,
            Err(AuthError::Token(TokenError::Expired))
        ));
        assert_eq!(f.store.reset_token_count(), 0);

        let account = f
            .store
            .find_account_by_email(&Email::new("jane@x.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(account.check_password("Sup3r$ecret", None));
    }

    #[tokio::test]
    async fn test_weak_password_keeps_token_usable() {
        let f = fixture(RecordingEmailSender::new()).await;
        f.flow.recover_password("jane@x.com").await.unwrap();
        let token = token_from(&f.mailer.sent()[0].body);

        assert!(matches!(
            f.flow.reset_password(&token, "password").await,
            Err(AuthError::Validation(errors)) if errors.len() == 2
        ));
        assert_eq!(f.store.reset_token_count(), 1);
        f.flow.reset_password(&token, "N3w$ecretPass").await.unwrap();
        assert_eq!(f.store.reset_token_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_hashes_with_configured_pepper() {
        let f = fixture(RecordingEmailSender::new()).await;
        let flow = PasswordResetFlow::new(
            f.store.clone(),
            f.mailer.clone(),
            Arc::new(AuthConfig {
                reset_link_base: "https://pos.example.com/reset-password".to_string(),
                password_pepper: Some(b"pos-pepper".to_vec()),
                ..AuthConfig::development()
            }),
            f.clock.clone(),
        );
        flow.recover_password("jane@x.com").await.unwrap();
        let token = token_from(&f.mailer.sent()[0].body);

        flow.reset_password(&token, "N3w$ecretPass").await.unwrap();
        assert_eq!(f.store.reset_token_count(), 0);

        let account = f
            .store
            .find_account_by_email(&Email::new("jane@x.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(account.check_password("N3w$ecretPass", Some(&b"pos-pepper"[..])));
        assert!(!account.check_password("N3w$ecretPass", None));
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_fail_reset() {
        let f = fixture(RecordingEmailSender::failing()).await;
        f.flow.recover_password("jane@x.com").await.unwrap();
        assert_eq!(f.store.reset_token_count(), 1);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_recover_user_sends_name() {
        let f = fixture(RecordingEmailSender::new()).await;
        f.flow.recover_user("jane@x.com").await.unwrap();
        assert_eq!(f.mailer.sent()[0].body, "Your username is: Jane");

        assert!(matches!(
            f.flow.recover_user("ghost@x.com").await,
            Err(AuthError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let f = fixture(RecordingEmailSender::new()).await;
        f.flow.recover_password("jane@x.com").await.unwrap();
        f.flow.recover_password("jane@x.com").await.unwrap();
        assert_eq!(f.flow.purge_expired().await.unwrap(), 0);

        f.clock.advance(Duration::minutes(30));
        assert_eq!(f.flow.purge_expired().await.unwrap(), 2);
    }
}

//! Entities

pub mod account;
pub mod password_reset;
pub mod session;

pub use account::{Account, AccountView, NewAccount};
pub use password_reset::PasswordResetToken;
pub use session::{Session, SessionState, SessionSummary, hash_token};

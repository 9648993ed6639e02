//! Application Layer
//!
//! Use cases and application services.

pub mod account_admin;
pub mod audit;
pub mod check_session;
pub mod client_context;
pub mod config;
pub mod password_reset;
pub mod service;
pub mod session_registry;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod token_issuer;

// Re-exports
pub use account_admin::AccountChanges;
pub use client_context::ClientContextResolver;
pub use config::{AuthConfig, ConfigError};
pub use password_reset::{PasswordResetFlow, RECOVERY_ACKNOWLEDGEMENT};
pub use service::{AuthService, LoginOutput, Principal, SessionStatus, SweepReport};
pub use session_registry::{CreatedSession, ResolvedSession, SessionRegistry};
pub use sign_in::SignInInput;
pub use sign_up::SignUpInput;
pub use token_issuer::{TokenClaims, TokenError, TokenIssuer};

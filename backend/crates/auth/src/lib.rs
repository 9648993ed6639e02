//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, validation, repository and collaborator traits
//! - `application/` - Session registry, token issuer, password reset, `AuthService`
//! - `infra/` - PostgreSQL and in-memory stores, email and geolocation clients
//! - `presentation/` - HTTP handlers, DTOs, middleware, router
//!
//! ## Features
//! - Account registration with email + password
//! - Signed session tokens backed by server-side session records
//! - Single active session per account (configurable)
//! - Password recovery by emailed single-use token
//! - Role-based access (Admin, User, Viewer)
//!
//! ## Security Model
//! - Passwords hashed with Argon2id, optional pepper
//! - Only token digests are stored, for sessions and reset tokens
//! - Login failures never reveal whether the email exists
//! - Every session check re-reads the store; logout takes effect at once

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::service::AuthService;
pub use error::{AuthError, AuthResult};
pub use infra::postgres::PgAuthStore;
pub use presentation::router::auth_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod store {
    pub use crate::infra::memory::InMemoryAuthStore;
    pub use crate::infra::postgres::PgAuthStore;
}

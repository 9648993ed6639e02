//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::{AuthAppState, BearerToken, ClientOrigin, bearer_token};
pub use middleware::{require_admin, require_session};
pub use router::auth_router;

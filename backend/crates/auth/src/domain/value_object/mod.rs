//! Value Object Module

pub mod account_id;
pub mod account_role;
pub mod client_context;
pub mod email;
pub mod location;

pub use account_id::AccountId;
pub use account_role::AccountRole;
pub use client_context::ClientContext;
pub use email::Email;
pub use location::Location;

//! Domain Layer
//!
//! Contains entities, value objects, validation rules, repository traits and
//! the contracts of outbound collaborators.

pub mod clock;
pub mod collaborator;
pub mod entity;
pub mod repository;
pub mod validator;
pub mod value_object;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborator::{CollaboratorError, EmailMessage, EmailSender, GeoLookup};
pub use entity::{Account, AccountView, Session, SessionSummary};
pub use repository::{
    AccountRepository, AuthStore, PasswordResetRepository, SessionInsert, SessionRepository,
};

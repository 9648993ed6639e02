//! Infrastructure Layer
//!
//! Database implementations and external service integrations.

pub mod geo;
pub mod mail;
pub mod memory;
pub mod postgres;

pub use geo::{IpInfoGeoLookup, StaticGeoLookup};
pub use mail::{LogEmailSender, RecordingEmailSender, ResendEmailSender};
pub use memory::InMemoryAuthStore;
pub use postgres::PgAuthStore;

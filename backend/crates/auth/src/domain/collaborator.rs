//! Outbound collaborator contracts
//!
//! Email delivery and IP geolocation live outside the engine. Callers bound
//! every call with a timeout and degrade on failure; a collaborator error
//! never undoes a state change that is already durable.

use std::net::IpAddr;

use thiserror::Error;

use crate::domain::value_object::Location;

/// Failure of an outbound call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// One plain-text email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[trait_variant::make(EmailSender: Send)]
pub trait LocalEmailSender {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), CollaboratorError>;
}

#[trait_variant::make(GeoLookup: Send)]
pub trait LocalGeoLookup {
    async fn lookup(&self, ip: IpAddr) -> Result<Location, CollaboratorError>;
}

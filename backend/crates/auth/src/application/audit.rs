//! Audit trail
//!
//! Security-relevant outcomes go to the `audit` tracing target so they can be
//! routed to their own sink by the subscriber configuration.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Failure,
}

impl AuditStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failure => "failure",
        }
    }
}

/// Emit one audit event
///
/// `subject` identifies what was acted on (an account id, an email, "all").
pub fn audit(action: &str, subject: &str, status: AuditStatus, detail: &str) {
    tracing::info!(
        target: "audit",
        action,
        subject,
        status = status.as_str(),
        detail,
        "audit event"
    );
}

use serde::{Deserialize, Serialize};

use crate::domain::value_object::location::Location;

/// Who is calling: IP, User-Agent and the resolved coarse location
///
/// Captured once at login and stored on the session for audit and
/// session review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Location,
}

impl ClientContext {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>, location: Location) -> Self {
        Self {
            ip_address,
            user_agent,
            location,
        }
    }
}

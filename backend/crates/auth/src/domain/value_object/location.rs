//! Coarse geolocation attached to a session

use serde::{Deserialize, Serialize};

const UNKNOWN: &str = "Unknown";

/// Location resolved from a client IP
///
/// Persisted as JSON alongside the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub region: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Location {
    /// Record used whenever a lookup is skipped, fails or times out
    pub fn unknown() -> Self {
        Self {
            city: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            latitude: None,
            longitude: None,
            timezone: None,
        }
    }

    /// Record for loopback clients (local development)
    pub fn localhost() -> Self {
        Self {
            city: "Localhost".to_string(),
            region: "Local".to_string(),
            country: "Local".to_string(),
            ..Self::unknown()
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.city == UNKNOWN && self.country == UNKNOWN
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::unknown()
    }
}

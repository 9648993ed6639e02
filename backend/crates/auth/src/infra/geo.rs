//! IP geolocation
//!
//! [`IpInfoGeoLookup`] queries an ipinfo-style JSON endpoint
//! (`{base}/{ip}/json`). [`StaticGeoLookup`] answers from memory for tests.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;

use crate::domain::collaborator::{CollaboratorError, GeoLookup};
use crate::domain::value_object::Location;

pub const DEFAULT_GEO_LOOKUP_URL: &str = "https://ipinfo.io";

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    /// "lat,lon"
    loc: Option<String>,
    timezone: Option<String>,
}

impl IpInfoResponse {
    fn into_location(self) -> Location {
        let (latitude, longitude) = self
            .loc
            .as_deref()
            .and_then(|loc| loc.split_once(','))
            .and_then(|(lat, lon)| Some((lat.trim().parse::<f64>().ok()?, lon.trim().parse::<f64>().ok()?)))
            .map_or((None, None), |(lat, lon)| (Some(lat), Some(lon)));

        let unknown = Location::unknown();
        let non_empty = |v: Option<String>, fallback: String| {
            v.filter(|s| !s.trim().is_empty()).unwrap_or(fallback)
        };

        Location {
            city: non_empty(self.city, unknown.city),
            region: non_empty(self.region, unknown.region),
            country: non_empty(self.country, unknown.country),
            latitude,
            longitude,
            timezone: self.timezone,
        }
    }
}

pub struct IpInfoGeoLookup {
    client: reqwest::Client,
    base_url: String,
}

impl IpInfoGeoLookup {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl GeoLookup for IpInfoGeoLookup {
    async fn lookup(&self, ip: IpAddr) -> Result<Location, CollaboratorError> {
        let url = format!("{}/{}/json", self.base_url, ip);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Status(response.status().as_u16()));
        }

        let body: IpInfoResponse = response.json().await?;
        Ok(body.into_location())
    }
}

/// Fixed answer, optional delay, call counter
#[derive(Debug)]
pub struct StaticGeoLookup {
    location: Option<Location>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticGeoLookup {
    pub fn new(location: Location) -> Self {
        Self {
            location: Some(location),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every lookup fails with a transport error
    pub fn failing() -> Self {
        Self {
            location: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeoLookup for StaticGeoLookup {
    async fn lookup(&self, _ip: IpAddr) -> Result<Location, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.location
            .clone()
            .ok_or_else(|| CollaboratorError::Transport("lookup unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipinfo_response_mapping() {
        let body: IpInfoResponse = serde_json::from_str(
            r#"{"ip":"8.8.8.8","city":"Mountain View","region":"California","country":"US","loc":"37.4056,-122.0775","timezone":"America/Los_Angeles"}"#,
        )
        .unwrap();
        let loc = body.into_location();
        assert_eq!(loc.city, "Mountain View");
        assert_eq!(loc.country, "US");
        assert_eq!(loc.latitude, Some(37.4056));
        assert_eq!(loc.longitude, Some(-122.0775));
        assert_eq!(loc.timezone.as_deref(), Some("America/Los_Angeles"));
    }

    #[test]
    fn test_ipinfo_partial_response() {
        let body: IpInfoResponse = serde_json::from_str(r#"{"ip":"1.2.3.4","bogon":true}"#).unwrap();
        let loc = body.into_location();
        assert!(loc.is_unknown());
        assert_eq!(loc.latitude, None);
    }
}

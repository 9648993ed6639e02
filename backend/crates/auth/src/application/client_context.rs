//! Client Context Resolver
//!
//! Turns a request origin (IP, User-Agent) into the context stored on a
//! session. The geolocation call is bounded by a timeout and any failure
//! degrades to the "Unknown" location; resolving never fails.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use platform::client::RequestOrigin;

use crate::domain::collaborator::GeoLookup;
use crate::domain::value_object::{ClientContext, Location};

pub struct ClientContextResolver<G>
where
    G: GeoLookup,
{
    geo: Arc<G>,
    timeout: Duration,
}

impl<G> ClientContextResolver<G>
where
    G: GeoLookup,
{
    pub fn new(geo: Arc<G>, timeout: Duration) -> Self {
        Self { geo, timeout }
    }

    pub async fn resolve(&self, origin: &RequestOrigin) -> ClientContext {
        let location = self.locate(origin.ip).await;
        ClientContext::new(origin.ip_string(), origin.user_agent.clone(), location)
    }

    /// Coarse location for an IP
    ///
    /// Loopback is "Localhost" without a lookup; private and unspecified
    /// addresses, lookup errors and timeouts are "Unknown".
    pub async fn locate(&self, ip: Option<IpAddr>) -> Location {
        let Some(ip) = ip else {
            return Location::unknown();
        };

        if ip.is_loopback() {
            return Location::localhost();
        }
        if !is_routable(ip) {
            return Location::unknown();
        }

        match tokio::time::timeout(self.timeout, self.geo.lookup(ip)).await {
            Ok(Ok(location)) => location,
            Ok(Err(e)) => {
                tracing::warn!(ip = %ip, error = %e, "Geolocation lookup failed");
                Location::unknown()
            }
            Err(_) => {
                tracing::warn!(ip = %ip, timeout_ms = self.timeout.as_millis() as u64, "Geolocation lookup timed out");
                Location::unknown()
            }
        }
    }
}

fn is_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private() || v4.is_link_local() || v4.is_unspecified() || v4.is_broadcast())
        }
        IpAddr::V6(v6) => !v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::geo::StaticGeoLookup;

    fn berlin() -> Location {
        Location {
            city: "Berlin".to_string(),
            region: "Berlin".to_string(),
            country: "DE".to_string(),
            latitude: Some(52.52),
            longitude: Some(13.40),
            timezone: Some("Europe/Berlin".to_string()),
        }
    }

    #[tokio::test]
    async fn test_public_ip_is_looked_up() {
        let geo = Arc::new(StaticGeoLookup::new(berlin()));
        let resolver = ClientContextResolver::new(geo.clone(), Duration::from_secs(3));

        let origin = RequestOrigin::new(
            Some("203.0.113.9".parse().unwrap()),
            Some("Mozilla/5.0".to_string()),
        );
        let ctx = resolver.resolve(&origin).await;
        assert_eq!(ctx.location, berlin());
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(geo.calls(), 1);
    }

    #[tokio::test]
    async fn test_loopback_skips_lookup() {
        let geo = Arc::new(StaticGeoLookup::new(berlin()));
        let resolver = ClientContextResolver::new(geo.clone(), Duration::from_secs(3));

        let loc = resolver.locate(Some("127.0.0.1".parse().unwrap())).await;
        assert_eq!(loc, Location::localhost());
        assert_eq!(geo.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_unknown() {
        let resolver =
            ClientContextResolver::new(Arc::new(StaticGeoLookup::failing()), Duration::from_secs(3));
        let loc = resolver.locate(Some("198.51.100.4".parse().unwrap())).await;
        assert!(loc.is_unknown());

        assert!(resolver.locate(None).await.is_unknown());
        assert!(resolver.locate(Some("10.0.0.8".parse().unwrap())).await.is_unknown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_unknown() {
        let geo = StaticGeoLookup::new(berlin()).with_delay(Duration::from_secs(10));
        let resolver = ClientContextResolver::new(Arc::new(geo), Duration::from_secs(3));

        let loc = resolver.locate(Some("198.51.100.4".parse().unwrap())).await;
        assert!(loc.is_unknown());
    }
}

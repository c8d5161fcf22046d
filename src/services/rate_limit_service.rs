use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use ipnetwork::IpNetwork;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;

/// Keys rate limits by client IP. `X-Forwarded-For` is only believed when the
/// connecting peer is one of the configured proxies.
#[derive(Clone, Debug)]
pub struct IpKeyExtractor {
    trusted_proxies: Arc<[IpNetwork]>,
}

impl IpKeyExtractor {
    #[must_use]
    pub fn new(trusted_proxies: Vec<IpNetwork>) -> Self {
        Self { trusted_proxies: trusted_proxies.into() }
    }

    fn trusts(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(ip))
    }

    #[must_use]
    pub fn identify_client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        if !self.trusts(peer) {
            return peer;
        }

        // Walk the chain from the nearest hop; the first address we do not operate is the client.
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|chain| {
                chain.rsplit(',').filter_map(|hop| hop.trim().parse::<IpAddr>().ok()).find(|ip| !self.trusts(*ip))
            })
            .unwrap_or(peer)
    }
}

impl KeyExtractor for IpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let ConnectInfo(peer) =
            req.extensions().get::<ConnectInfo<SocketAddr>>().ok_or(GovernorError::UnableToExtractKey)?;
        Ok(self.identify_client_ip(req.headers(), peer.ip()))
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitService {
    pub extractor: IpKeyExtractor,
    decisions: Counter<u64>,
}

impl RateLimitService {
    #[must_use]
    pub fn new(trusted_proxies: Vec<IpNetwork>) -> Self {
        let decisions = global::meter("statspro-server")
            .u64_counter("rate_limit_decisions_total")
            .with_description("Auth API requests by rate limit outcome")
            .build();
        Self { extractor: IpKeyExtractor::new(trusted_proxies), decisions }
    }

    /// Counts one governor decision. Throttled requests are logged with their back-off.
    pub fn log_decision(&self, status: StatusCode, retry_after: Option<&str>) {
        let throttled = status == StatusCode::TOO_MANY_REQUESTS;
        if throttled {
            tracing::warn!(retry_after_secs = retry_after.unwrap_or("unknown"), "Rate limit exceeded");
        }
        let outcome = if throttled { "throttled" } else { "allowed" };
        self.decisions.add(1, &[KeyValue::new("status", outcome)]);
    }
}

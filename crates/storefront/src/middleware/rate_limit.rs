//! Rate limiting middleware using governor and `tower_governor`.
//!
//! The cart API allows ~120 mutations per minute per client IP, with a burst
//! of 30 for quick quantity taps.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Milliseconds between replenished tokens.
const CART_REPLENISH_MS: u64 = 500;

/// Requests allowed in a burst.
const CART_BURST: u32 = 30;

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Proxy headers checked for the client IP, most specific first.
const CLIENT_IP_HEADERS: &[&str] = &["cf-connecting-ip", "fly-client-ip", "x-real-ip"];

/// Key extractor that reads the client IP from proxy headers.
#[derive(Debug, Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        for name in CLIENT_IP_HEADERS {
            if let Some(ip) = headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
            {
                return Ok(ip);
            }
        }

        // First hop of X-Forwarded-For
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create the rate limiter for `/cart` endpoints.
///
/// Returns `None` only if the governor rejects the constants above.
#[must_use]
pub fn cart_rate_limiter() -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_millisecond(CART_REPLENISH_MS)
        .burst_size(CART_BURST)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

//! Per-client rate limiting on `/api`
//!
//! A keyed GCRA limiter (`governor`) allows `max_requests` per window per
//! client address, refilling evenly across the window. Clients are keyed
//! by peer address, or by the first `X-Forwarded-For` hop when
//! `rate_limit.trust_proxy` is set.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::RateLimitConfig;
use crate::handlers::ApiError;

/// Message sent with every 429
pub const TOO_MANY_REQUESTS: &str = "Too many requests from this IP, please try again in an hour!";

/// Rate limiting middleware state
#[derive(Clone)]
pub struct RateLimit {
    limiter: Option<Arc<DefaultKeyedRateLimiter<String>>>,
    max_requests: u32,
    trust_proxy: bool,
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimit")
            .field("enabled", &self.limiter.is_some())
            .field("max_requests", &self.max_requests)
            .field("trust_proxy", &self.trust_proxy)
            .finish()
    }
}

impl RateLimit {
    /// Build the limiter; a disabled or zero-sized config lets everything through
    pub fn new(config: &RateLimitConfig) -> Self {
        let limiter = NonZeroU32::new(config.max_requests)
            .filter(|_| config.enabled)
            .and_then(|burst| {
                Quota::with_period(config.window() / burst.get()).map(|quota| quota.allow_burst(burst))
            })
            .map(|quota| Arc::new(RateLimiter::keyed(quota)));

        Self {
            limiter,
            max_requests: config.max_requests,
            trust_proxy: config.trust_proxy,
        }
    }

    /// Key for the calling client
    pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
        headers
            .get("x-forwarded-for")
            .filter(|_| trust_proxy)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .map(str::to_string)
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Middleware function to enforce the limit
    pub async fn middleware(
        State(rate_limit): State<Self>,
        request: Request,
        next: Next,
    ) -> Result<Response, ApiError> {
        let Some(limiter) = &rate_limit.limiter else {
            return Ok(next.run(request).await);
        };

        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        let key = Self::client_key(request.headers(), peer, rate_limit.trust_proxy);

        if limiter.check_key(&key).is_err() {
            tracing::warn!(client = %key, "rate limit exceeded");
            return Err(ApiError::too_many_requests(TOO_MANY_REQUESTS));
        }
        if limiter.len() > 10_000 {
            limiter.retain_recent();
        }

        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert("x-ratelimit-limit", HeaderValue::from(rate_limit.max_requests));
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    fn app(max_requests: u32, enabled: bool) -> Router {
        let config = RateLimitConfig {
            max_requests,
            window_secs: 3600,
            enabled,
            trust_proxy: true,
        };
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(RateLimit::new(&config), RateLimit::middleware))
    }

    fn from(ip: &'static str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_limit_is_per_client() {
        let app = app(2, true);
        for _ in 0..2 {
            let response = app.clone().oneshot(from("10.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        }
        let response = app.clone().oneshot(from("10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.oneshot(from("10.0.0.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_disabled_limiter_passes_everything() {
        let app = app(1, false);
        for _ in 0..3 {
            let response = app.clone().oneshot(from("10.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[test]
    fn test_client_key() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.5:4000".parse().unwrap();
        assert_eq!(RateLimit::client_key(&headers, Some(peer), true), "192.168.1.5");
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(RateLimit::client_key(&headers, Some(peer), true), "203.0.113.7");
        assert_eq!(RateLimit::client_key(&HeaderMap::new(), None, true), "unknown");
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_without_trusted_proxy() {
        let config = RateLimitConfig {
            max_requests: 1,
            window_secs: 3600,
            enabled: true,
            trust_proxy: false,
        };
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(RateLimit::new(&config), RateLimit::middleware));

        let first = app.clone().oneshot(from("10.0.0.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let rotated = app.oneshot(from("10.0.0.2")).await.unwrap();
        assert_eq!(rotated.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = from("203.0.113.7").headers().clone();
        let peer: SocketAddr = "192.168.1.5:4000".parse().unwrap();
        assert_eq!(RateLimit::client_key(&headers, Some(peer), false), "192.168.1.5");
    }
}

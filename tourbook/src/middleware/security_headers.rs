//! Security headers middleware
//!
//! Applies standard HTTP security headers using
//! `tower_http::set_header::SetResponseHeaderLayer`. Handlers may still
//! set their own values; only missing headers are filled in, except HSTS.

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

/// HSTS max-age (180 days)
const HSTS_MAX_AGE_SECS: u64 = 15_552_000;

/// Headers added when missing from a response
const DEFAULT_HEADERS: &[(HeaderName, &str)] = &[
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
    (header::X_XSS_PROTECTION, "0"),
    (header::REFERRER_POLICY, "no-referrer"),
    (header::X_DNS_PREFETCH_CONTROL, "off"),
];

/// Apply security headers to the router
///
/// `production` controls whether HSTS is sent.
pub fn apply_security_headers<S>(mut app: Router<S>, production: bool) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if production {
        let value = format!("max-age={}; includeSubDomains", HSTS_MAX_AGE_SECS);
        if let Ok(hv) = HeaderValue::from_str(&value) {
            app = app.layer(SetResponseHeaderLayer::overriding(
                header::STRICT_TRANSPORT_SECURITY,
                hv,
            ));
        }
    }

    for (name, value) in DEFAULT_HEADERS {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            name.clone(),
            HeaderValue::from_static(value),
        ));
    }

    app.layer(SetResponseHeaderLayer::if_not_present(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_headers_applied() {
        let app = apply_security_headers(Router::new().route("/", get(|| async { "ok" })), false);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert!(response.headers().get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn test_hsts_in_production() {
        let app = apply_security_headers(Router::new().route("/", get(|| async { "ok" })), true);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers()[header::STRICT_TRANSPORT_SECURITY]
            .to_str()
            .unwrap()
            .starts_with("max-age=15552000"));
    }
}

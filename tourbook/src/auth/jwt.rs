//! Signed session tokens
//!
//! HS256 JWTs carrying `{sub, iat, exp}`. Clients present them either as
//! `Authorization: Bearer <token>` or in the `jwt` cookie set at login.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use cookie::Cookie;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::Result;
use crate::handlers::ApiError;

/// Name of the session cookie
pub const COOKIE_NAME: &str = "jwt";

/// Value written to the cookie on logout
pub const LOGGED_OUT: &str = "loggedout";

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User `_id`
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
    lifetime: Duration,
    cookie_lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build from configuration
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            validation,
            lifetime: Duration::days(config.expires_in_days),
            cookie_lifetime: Duration::days(config.cookie_expires_in_days),
        }
    }

    /// Sign a token for `user_id`
    pub fn issue(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => {
                    ApiError::unauthorized("Your token has expired! Please log in again.")
                }
                _ => ApiError::unauthorized("Invalid token. Please log in again!"),
            })
    }

    /// `Set-Cookie` value carrying a freshly issued token
    pub fn session_cookie(&self, token: &str, secure: bool) -> String {
        Cookie::build((COOKIE_NAME, token.to_string()))
            .path("/")
            .max_age(cookie::time::Duration::seconds(self.cookie_lifetime.num_seconds()))
            .http_only(true)
            .secure(secure)
            .build()
            .to_string()
    }

    /// `Set-Cookie` value that replaces the token for ten seconds
    pub fn logout_cookie() -> String {
        Cookie::build((COOKIE_NAME, LOGGED_OUT))
            .path("/")
            .max_age(cookie::time::Duration::seconds(10))
            .http_only(true)
            .build()
            .to_string()
    }
}

/// Token from the `Authorization` header, falling back to the `jwt` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw.to_string()).filter_map(|c| c.ok()))
        .find(|cookie| cookie.name() == COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| token != LOGGED_OUT && !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ApiErrorKind;
    use axum::http::HeaderValue;

    fn service(days: i64) -> TokenService {
        TokenService::new(&JwtConfig {
            secret: "a-secret-long-enough-for-hs256-signing".to_string(),
            expires_in_days: days,
            cookie_expires_in_days: 90,
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service(90);
        let token = tokens.issue("u1").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service(-1);
        let token = tokens.issue("u1").unwrap();
        let err = tokens.verify(&token).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Unauthorized);
        assert_eq!(err.message, "Your token has expired! Please log in again.");
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let token = service(90).issue("u1").unwrap();
        let other = TokenService::new(&JwtConfig {
            secret: "another-secret-entirely-for-this-test".to_string(),
            expires_in_days: 90,
            cookie_expires_in_days: 90,
        });
        let err = other.verify(&token).unwrap_err();
        assert_eq!(err.message, "Invalid token. Please log in again!");
    }

    #[test]
    fn test_extract_prefers_bearer_then_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; jwt=from-cookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_logged_out_cookie_is_not_a_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=loggedout"));
        assert!(extract_token(&headers).is_none());
    }

    #[test]
    fn test_cookies() {
        let cookie = service(90).session_cookie("abc", true);
        assert!(cookie.starts_with("jwt=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(TokenService::logout_cookie().contains("Max-Age=10"));
    }
}

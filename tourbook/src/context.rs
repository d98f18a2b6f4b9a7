//! Request-scoped context
//!
//! The time a request arrived, its request id and the authenticated user
//! travel in request extensions and are read back through the
//! [`RequestContext`] extractor. Nothing here is global.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower_http::request_id::RequestId;

use crate::repository::Document;
use crate::schema::format_date;

/// When the request entered the `/api` router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTime(pub DateTime<Utc>);

/// The authenticated user, attached by `protect`
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    user: Document,
}

impl Identity {
    /// Wrap a stored user document (hidden fields already removed)
    pub fn new(user: Document) -> Self {
        Self { user }
    }

    fn text(&self, field: &str) -> &str {
        self.user.get(field).and_then(Value::as_str).unwrap_or_default()
    }

    /// The user's `_id`
    pub fn id(&self) -> &str {
        self.text("_id")
    }

    /// The user's role
    pub fn role(&self) -> &str {
        self.text("role")
    }

    /// The user's email address
    pub fn email(&self) -> &str {
        self.text("email")
    }

    /// The user's display name
    pub fn name(&self) -> &str {
        self.text("name")
    }

    /// The full user document
    pub fn user(&self) -> &Document {
        &self.user
    }
}

/// Everything a handler may want to know about the current request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Arrival time
    pub requested_at: DateTime<Utc>,
    /// Value of the `x-request-id` header, if one was assigned
    pub request_id: Option<String>,
    /// The authenticated user, on protected routes
    pub identity: Option<Identity>,
}

impl RequestContext {
    /// Arrival time as an RFC 3339 string
    pub fn requested_at_string(&self) -> String {
        format_date(self.requested_at)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let requested_at = parts
            .extensions
            .get::<RequestTime>()
            .map(|time| time.0)
            .unwrap_or_else(Utc::now);
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .map(str::to_string);
        let identity = parts.extensions.get::<Identity>().cloned();

        Ok(Self {
            requested_at,
            request_id,
            identity,
        })
    }
}

/// Middleware stamping [`RequestTime`] on every request
pub async fn stamp_request_time(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestTime(Utc::now()));
    next.run(request).await
}

//! Authentication and role middleware
//!
//! Both functions are meant for `route_layer`. `protect` must run first
//! (be added last) so that `restrict_to` finds the [`Identity`]:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/{id}", delete(factory::delete::<Tour, S>))
//!     .route_layer(from_fn_with_state(Roles(&["admin", "lead-guide"]), restrict_to))
//!     .route_layer(from_fn_with_state(state.clone(), protect::<S>))
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use super::jwt::extract_token;
use crate::context::Identity;
use crate::handlers::{ApiError, ApiOperation};
use crate::query::{scope_filter, scope_projection};
use crate::repository::{Document, DocumentStore};
use crate::resources::{Resource, User};
use crate::schema::parse_date;
use crate::state::AppState;

/// Message for requests without a usable token
pub const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";

/// Roles allowed through [`restrict_to`]
#[derive(Debug, Clone, Copy)]
pub struct Roles(pub &'static [&'static str]);

impl Roles {
    /// Whether `role` is one of the allowed roles
    pub fn allows(&self, role: &str) -> bool {
        self.0.iter().any(|allowed| *allowed == role)
    }
}

/// Whether the password changed after a token issued at `issued_at` (Unix seconds)
pub fn changed_password_after(user: &Document, issued_at: i64) -> bool {
    user.get("passwordChangedAt")
        .and_then(Value::as_str)
        .and_then(parse_date)
        .is_some_and(|changed| issued_at < changed.timestamp())
}

/// Require a valid session token and attach the user as [`Identity`]
pub async fn protect<S: DocumentStore>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or_else(|| {
        ApiError::unauthorized(NOT_LOGGED_IN).with_operation(ApiOperation::Authenticate)
    })?;
    let claims = state.tokens().verify(&token)?;

    let decorations = User::read_decorations();
    let user = state
        .store()
        .find_by_id(
            User::COLLECTION,
            &claims.sub,
            &scope_filter(&decorations),
            &scope_projection(&decorations),
        )
        .await?
        .ok_or_else(|| {
            ApiError::unauthorized("The user belonging to this token does no longer exist.")
        })?;

    if changed_password_after(&user, claims.iat) {
        return Err(ApiError::unauthorized(
            "User recently changed password! Please log in again.",
        ));
    }

    tracing::debug!(user = %claims.sub, "request authenticated");
    request.extensions_mut().insert(Identity::new(user));
    Ok(next.run(request).await)
}

/// Reject authenticated users whose role is not listed
pub async fn restrict_to(
    State(roles): State<Roles>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))?;

    if !roles.allows(identity.role()) {
        tracing::debug!(user = %identity.id(), role = %identity.role(), "role not permitted");
        return Err(ApiError::forbidden(
            "You do not have permission to perform this action",
        ));
    }
    Ok(next.run(request).await)
}

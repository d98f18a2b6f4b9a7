//! API error types for handler operations
//!
//! Every handler failure ends up as an [`ApiError`], rendered as the error
//! envelope `{"status": "fail" | "error", "message": ...}`: `fail` for
//! client errors and `error` for server errors. Store and upstream failures
//! are answered with a generic message and the cause is logged instead;
//! `Internal` and `ServiceUnavailable` messages are written by us and sent
//! as they are.
//!
//! # Example
//!
//! ```rust
//! use tourbook::handlers::{ApiError, ApiErrorKind};
//!
//! let error = ApiError::not_found("Tour", "5c88fa8cf4afda39709c2951");
//! assert!(matches!(error.kind, ApiErrorKind::NotFound));
//! assert_eq!(error.message, "No document found with that ID");
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::repository::{StoreError, StoreErrorKind, StoreOperation};
use crate::schema::ValidationErrors;

/// Message sent in place of server-side error details
pub const GENERIC_SERVER_MESSAGE: &str = "Something went very wrong!";

/// Handler operation that produced the error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// Listing a collection
    List,
    /// Fetching one document
    Get,
    /// Creating a document
    Create,
    /// Updating a document
    Update,
    /// Deleting a document
    Delete,
    /// Signing up, logging in or checking credentials
    Authenticate,
    /// Computing an aggregate read model
    Aggregate,
    /// Creating a checkout session
    Checkout,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Get => write!(f, "get"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Authenticate => write!(f, "authenticate"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::Checkout => write!(f, "checkout"),
        }
    }
}

/// Category of API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// The addressed document does not exist (or is hidden)
    NotFound,
    /// The payload violated the resource schema
    ValidationFailed,
    /// A unique index rejected the write
    Duplicate,
    /// The store rejected or failed the operation
    StoreFailure,
    /// Malformed request
    BadRequest,
    /// Missing or invalid credentials
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden,
    /// Rate limit exceeded
    TooManyRequests,
    /// A downstream collaborator is not available
    ServiceUnavailable,
    /// A downstream collaborator failed the call
    Upstream,
    /// Anything else that went wrong on our side
    Internal,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::StoreFailure => write!(f, "store_failure"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::TooManyRequests => write!(f, "too_many_requests"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
            Self::Upstream => write!(f, "upstream"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl ApiErrorKind {
    /// HTTP status for this kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ValidationFailed | Self::Duplicate | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream => StatusCode::BAD_GATEWAY,
            Self::StoreFailure | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for 5xx kinds
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Structured handler error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Operation that failed
    pub operation: ApiOperation,
    /// Error category
    pub kind: ApiErrorKind,
    /// Message for the caller (client errors) or the log (server errors)
    pub message: String,
    /// Resource name involved, if any
    pub entity_type: Option<String>,
    /// Document id involved, if any
    pub entity_id: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(operation: ApiOperation, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// No document with this id
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            ApiOperation::Get,
            ApiErrorKind::NotFound,
            "No document found with that ID",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Payload failed validation
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Create, ApiErrorKind::ValidationFailed, message)
    }

    /// Malformed request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::List, ApiErrorKind::BadRequest, message)
    }

    /// Missing or invalid credentials
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Authenticate, ApiErrorKind::Unauthorized, message)
    }

    /// Authenticated but not allowed
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Authenticate, ApiErrorKind::Forbidden, message)
    }

    /// Rate limit exceeded
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::List, ApiErrorKind::TooManyRequests, message)
    }

    /// A downstream collaborator is not available
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Get, ApiErrorKind::ServiceUnavailable, message)
    }

    /// Something went wrong on our side
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Get, ApiErrorKind::Internal, message)
    }

    /// Attach resource context
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: ApiOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Envelope status word for this error
    pub fn status_word(&self) -> &'static str {
        if self.kind.is_server_error() {
            "error"
        } else {
            "fail"
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    status: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();

        let message = if self.kind.is_server_error() {
            tracing::error!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                "API error: {}", self.message
            );
            match self.kind {
                ApiErrorKind::ServiceUnavailable | ApiErrorKind::Internal => self.message,
                _ => GENERIC_SERVER_MESSAGE.to_string(),
            }
        } else {
            tracing::debug!(
                operation = %self.operation,
                kind = %self.kind,
                entity_id = ?self.entity_id,
                "API error: {}", self.message
            );
            self.message
        };

        let body = ErrorEnvelope {
            status: if status.is_server_error() { "error" } else { "fail" },
            message,
        };
        (status, Json(body)).into_response()
    }
}

fn store_operation_to_api_operation(op: StoreOperation) -> ApiOperation {
    match op {
        StoreOperation::Find | StoreOperation::Count => ApiOperation::List,
        StoreOperation::FindById | StoreOperation::FindOne => ApiOperation::Get,
        StoreOperation::Create | StoreOperation::EnsureIndex => ApiOperation::Create,
        StoreOperation::Update => ApiOperation::Update,
        StoreOperation::Delete => ApiOperation::Delete,
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let operation = store_operation_to_api_operation(err.operation);
        match (err.kind, err.duplicate_key) {
            (StoreErrorKind::Duplicate, Some((_, value))) => Self::new(
                operation,
                ApiErrorKind::Duplicate,
                format!("Duplicate field value: {}. Please use another value!", value),
            ),
            (kind, _) => {
                let mut error = Self::new(
                    operation,
                    if kind == StoreErrorKind::Duplicate {
                        ApiErrorKind::Duplicate
                    } else {
                        ApiErrorKind::StoreFailure
                    },
                    err.message,
                );
                error.entity_type = err.collection;
                error
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation_failed(format!("Invalid input data. {}", errors))
    }
}

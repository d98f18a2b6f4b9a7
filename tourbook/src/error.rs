//! Process-level errors and their HTTP conversion
//!
//! [`Error`] covers failures outside the request path: loading
//! configuration, connecting the store, building the mail transport,
//! hashing or signing. When one of them surfaces inside a handler it is
//! turned into an [`ApiError`] and rendered as the usual error envelope.

use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::handlers::{ApiError, ApiErrorKind, ApiOperation, GENERIC_SERVER_MESSAGE};
use crate::mail::MailError;
use crate::payments::PaymentError;
use crate::repository::StoreError;

/// Result alias for process-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Document store error
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Token signing or verification error
    #[error("JWT error: {0}")]
    Jwt(Box<jsonwebtoken::errors::Error>),

    /// Password hashing error
    #[error("Password hashing error: {0}")]
    Password(String),

    /// Mail transport error
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// Payment gateway error
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(Box<axum::http::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Jwt(Box::new(err))
    }
}

impl From<axum::http::Error> for Error {
    fn from(err: axum::http::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Store(store) => store.into(),
            Error::Mail(mail) => {
                tracing::error!(error = %mail, "mail delivery failed");
                ApiError::new(
                    ApiOperation::Authenticate,
                    ApiErrorKind::Internal,
                    "There was an error sending the email. Try again later!",
                )
            }
            Error::Payment(PaymentError::Disabled) => {
                ApiError::service_unavailable("Payments are not configured on this server")
                    .with_operation(ApiOperation::Checkout)
            }
            Error::Payment(payment) => ApiError::new(
                ApiOperation::Checkout,
                ApiErrorKind::Upstream,
                payment.to_string(),
            ),
            other => {
                tracing::error!(error = %other, "unexpected failure while handling request");
                ApiError::internal(GENERIC_SERVER_MESSAGE)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_store_error_keeps_duplicate_mapping() {
        let err: ApiError = Error::from(StoreError::duplicate("users", "email", "a@b.io")).into();
        assert_eq!(err.kind, ApiErrorKind::Duplicate);
    }

    #[test]
    fn test_internal_errors_are_server_errors() {
        let response = Error::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_disabled_payments_are_unavailable() {
        let err: ApiError = Error::Payment(PaymentError::Disabled).into();
        assert_eq!(err.kind, ApiErrorKind::ServiceUnavailable);
    }
}

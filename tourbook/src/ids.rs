//! Identifiers
//!
//! Request ids are TypeIDs (`req_<base32 uuidv7>`) so they sort by time in
//! logs. Document ids are bare UUIDv7 hex strings: time ordered and safe to
//! embed in URLs.
//!
//! ```rust
//! use tourbook::ids::{new_document_id, RequestId};
//!
//! let request_id = RequestId::new();
//! assert!(request_id.as_str().starts_with("req_"));
//! assert_eq!(new_document_id().len(), 32);
//! ```

use std::fmt;
use std::str::FromStr;

use http::Request;
use mti::prelude::*;
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};
use uuid::Uuid;

/// Fresh `_id` for a stored document
pub fn new_document_id() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Time-sortable id of one HTTP request
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(MagicTypeId);

impl RequestId {
    /// TypeID prefix
    pub const PREFIX: &'static str = "req";

    /// New id for the current instant
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    /// The id as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = RequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = MagicTypeId::from_str(s).map_err(RequestIdError::Parse)?;
        if parsed.prefix().as_str() != Self::PREFIX {
            return Err(RequestIdError::InvalidPrefix(parsed.prefix().as_str().to_string()));
        }
        Ok(Self(parsed))
    }
}

/// Failure to read a request id
#[derive(Debug, thiserror::Error)]
pub enum RequestIdError {
    /// Not a TypeID
    #[error("failed to parse request ID: {0}")]
    Parse(#[from] MagicTypeIdError),

    /// A TypeID of some other kind
    #[error("invalid prefix: expected 'req', got '{0}'")]
    InvalidPrefix(String),
}

/// Generates [`RequestId`]s for `tower_http::request_id::SetRequestIdLayer`
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTypedRequestId;

impl MakeRequestId for MakeTypedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let id = RequestId::new();
        let header_value = http::HeaderValue::from_str(id.as_str()).ok()?;
        Some(TowerRequestId::new(header_value))
    }
}

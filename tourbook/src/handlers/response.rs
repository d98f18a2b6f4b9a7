//! Response envelopes for REST handlers
//!
//! Successful responses share one shape:
//!
//! ```json
//! { "status": "success", "results": 2, "data": { "data": [ ... ] } }
//! ```
//!
//! `results` appears on list responses only.
//!
//! # Example
//!
//! ```rust
//! use tourbook::handlers::{ItemResponse, ListResponse};
//! use serde_json::json;
//!
//! let created = ItemResponse::created(json!({"_id": "t1", "name": "The Forest Hiker"}));
//! assert_eq!(created.status_code.as_u16(), 201);
//!
//! let list = ListResponse::new(vec![json!({"_id": "t1"}), json!({"_id": "t2"})]);
//! assert_eq!(list.results(), 2);
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Envelope status word for successful responses
pub const SUCCESS: &str = "success";

/// The `data` wrapper inside an envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataWrapper<T> {
    /// The payload
    pub data: T,
}

/// The serialized envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Always `success`
    pub status: &'static str,
    /// Time the request was received (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<String>,
    /// Number of documents in a list response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    /// Payload wrapper
    pub data: DataWrapper<T>,
}

/// Single document response
#[derive(Debug, Clone)]
pub struct ItemResponse<T> {
    /// HTTP status (200 or 201)
    pub status_code: StatusCode,
    /// The document
    pub data: T,
}

impl<T> ItemResponse<T> {
    /// 200 response
    pub fn new(data: T) -> Self {
        Self {
            status_code: StatusCode::OK,
            data,
        }
    }

    /// 201 response
    pub fn created(data: T) -> Self {
        Self {
            status_code: StatusCode::CREATED,
            data,
        }
    }

    /// Map the inner data to a new type
    pub fn map<U, F>(self, f: F) -> ItemResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        ItemResponse {
            status_code: self.status_code,
            data: f(self.data),
        }
    }

    /// The envelope this response serializes to
    pub fn envelope(&self) -> Envelope<&T> {
        Envelope {
            status: SUCCESS,
            requested_at: None,
            results: None,
            data: DataWrapper { data: &self.data },
        }
    }
}

impl<T: Serialize> IntoResponse for ItemResponse<T> {
    fn into_response(self) -> Response {
        (self.status_code, Json(self.envelope())).into_response()
    }
}

/// List response
#[derive(Debug, Clone)]
pub struct ListResponse<T> {
    /// The documents, in query order
    pub data: Vec<T>,
    /// Time the request was received
    pub requested_at: Option<String>,
}

impl<T> ListResponse<T> {
    /// Wrap a page of documents
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            requested_at: None,
        }
    }

    /// Stamp the request time
    #[must_use]
    pub fn with_requested_at(mut self, requested_at: impl Into<String>) -> Self {
        self.requested_at = Some(requested_at.into());
        self
    }

    /// Number of documents
    pub fn results(&self) -> usize {
        self.data.len()
    }

    /// The envelope this response serializes to
    pub fn envelope(&self) -> Envelope<&[T]> {
        Envelope {
            status: SUCCESS,
            requested_at: self.requested_at.clone(),
            results: Some(self.data.len()),
            data: DataWrapper { data: &self.data },
        }
    }
}

impl<T: Serialize> IntoResponse for ListResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.envelope())).into_response()
    }
}

//! REST handlers for document resources
//!
//! # Features
//!
//! - **Generic CRUD**: [`factory::ResourceHandlers`] and the axum handler
//!   functions in [`factory`], instantiated once per [`Resource`](crate::resources::Resource)
//! - **Envelopes**: [`ItemResponse`] and [`ListResponse`] render the
//!   `{status, results?, data: {data}}` shape
//! - **Error Handling**: [`ApiError`] with automatic HTTP status code mapping
//!   and the `{status: "fail"|"error", message}` body

mod error;
pub mod factory;
mod response;

pub use error::{ApiError, ApiErrorKind, ApiOperation, GENERIC_SERVER_MESSAGE};
pub use factory::{Payload, ResourceHandlers};
pub use response::{DataWrapper, Envelope, ItemResponse, ListResponse, SUCCESS};

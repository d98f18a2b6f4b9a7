//! # tourbook
//!
//! Tour booking REST API: tours, users, reviews and bookings served by one
//! generic set of CRUD handlers over a pluggable document store.
//!
//! ## Features
//!
//! - **Query feature builder**: filter operators, sorting, field selection
//!   and pagination from the query string ([`query`])
//! - **Generic handlers**: list/get/create/update/delete for any
//!   [`resources::Resource`] ([`handlers::factory`])
//! - **Authentication**: JWT sessions, argon2 passwords, role checks and
//!   password reset by email ([`auth`])
//! - **Read models**: tour statistics, monthly plan and geo queries
//!   ([`analytics`])
//! - **Checkout**: hosted payment sessions for bookings ([`payments`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use tourbook::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder(MemoryStore::new())
//!         .config(config.clone())
//!         .build()
//!         .await?;
//!
//!     Server::new(config).serve(api_router(state)).await
//! }
//! ```

pub mod analytics;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod mail;
pub mod middleware;
pub mod observability;
pub mod payments;
pub mod query;
pub mod repository;
pub mod resources;
pub mod routes;
pub mod schema;
pub mod server;
pub mod state;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::{protect, restrict_to, PasswordHasher, Roles, TokenService};
    pub use crate::config::Config;
    pub use crate::context::{Identity, RequestContext};
    pub use crate::error::{Error, Result};
    pub use crate::handlers::{
        factory, ApiError, ApiErrorKind, ApiOperation, ItemResponse, ListResponse, Payload,
        ResourceHandlers,
    };
    pub use crate::ids::RequestId;
    pub use crate::mail::{LogMailer, Mailer, SmtpMailer};
    pub use crate::observability::init_tracing;
    pub use crate::payments::{PaymentGateway, StripeGateway};
    pub use crate::query::{QueryDecoration, QueryFeatures, QueryParams};
    pub use crate::repository::{Document, DocumentStore, MemoryStore};
    pub use crate::resources::{Booking, Resource, Review, Tour, User};
    pub use crate::routes::api_router;
    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder};

    #[cfg(feature = "mongodb")]
    pub use crate::repository::MongoStore;

    pub use axum::{
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Json, Response},
        routing::{delete, get, patch, post},
        Router,
    };
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, warn};
}

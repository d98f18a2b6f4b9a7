//! Resource descriptors
//!
//! A [`Resource`] tells the generic handlers everything they need to know
//! about one collection: its schema, the rules applied to every read, the
//! relations populated on get-one, an optional parent for nested routes,
//! and the write/read transformations that used to live in storage hooks.

pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::Booking;
pub use review::Review;
pub use tour::Tour;
pub use user::User;

use crate::query::QueryDecoration;
use crate::repository::{Document, Populate, Projection};
use crate::schema::{Schema, VERSION_KEY};

/// Parent relation for nested routes (`/tours/{id}/reviews`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    /// Field on the child holding the parent's `_id`
    pub field: &'static str,
}

/// Static description of a resource served by the generic handlers
pub trait Resource: Send + Sync + 'static {
    /// Human readable name used in logs and errors
    const NAME: &'static str;

    /// Store collection
    const COLLECTION: &'static str;

    /// Declared fields and indexes
    fn schema() -> &'static Schema;

    /// Rules applied to every read, after the caller-driven query steps
    fn decorations() -> Vec<QueryDecoration> {
        Vec::new()
    }

    /// Relations populated only when a single document is fetched
    fn populate_on_get() -> Vec<Populate> {
        Vec::new()
    }

    /// Parent relation, for resources mounted under another one
    fn parent() -> Option<ParentLink> {
        None
    }

    /// Field recording the authenticated user on creates
    fn owner() -> Option<&'static str> {
        None
    }

    /// Filter fields that may repeat in a query string to match any value
    fn repeatable_params() -> &'static [&'static str] {
        &[]
    }

    /// Adjust a validated document before insertion
    fn prepare(_doc: &mut Document) {}

    /// Adjust validated changes before an update
    fn prepare_update(_changes: &mut Document) {}

    /// Add computed fields to an outgoing document
    fn present(_doc: &mut Document) {}

    /// Decorations plus the exclusion of hidden fields
    fn read_decorations() -> Vec<QueryDecoration> {
        let mut decorations = Self::decorations();
        let hidden = Self::schema().hidden_fields();
        if !hidden.is_empty() {
            decorations.push(QueryDecoration::HideFields(hidden));
        }
        decorations
    }
}

/// Projection used when one resource is embedded in another
///
/// Drops the version key, every hidden field and `extra`.
pub fn embedded_projection<R: Resource>(extra: &[&str]) -> Projection {
    let mut excluded = vec![VERSION_KEY];
    excluded.extend(R::schema().hidden_fields());
    excluded.extend_from_slice(extra);
    Projection::default().without(&excluded)
}

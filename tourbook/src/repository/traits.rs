//! The document store capability interface
//!
//! Handlers are generic over [`DocumentStore`] so the same factory code runs
//! against the in-memory store in tests and MongoDB in production. Each
//! method is a single store call; nothing here retries or composes
//! transactions.

use std::future::Future;

use super::error::StoreError;
use super::query::{Filter, FindQuery, Projection};
use super::Document;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Field-level changes for [`DocumentStore::update_by_id`]
///
/// ```rust
/// use serde_json::json;
/// use tourbook::repository::Update;
///
/// let update = Update::new()
///     .set("active", json!(false))
///     .unset("passwordResetToken");
/// assert_eq!(update.unset, vec!["passwordResetToken".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Fields to overwrite
    pub set: Document,
    /// Fields to remove
    pub unset: Vec<String>,
}

impl Update {
    /// An empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite every field in `changes`
    pub fn from_changes(changes: Document) -> Self {
        Self {
            set: changes,
            unset: Vec::new(),
        }
    }

    /// Overwrite one field
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.set.insert(field.into(), value);
        self
    }

    /// Remove one field
    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Apply the changes to a document in place
    pub fn apply_to(&self, doc: &mut Document) {
        for (key, value) in &self.set {
            doc.insert(key.clone(), value.clone());
        }
        for key in &self.unset {
            doc.remove(key);
        }
    }
}

/// Collection-addressed document store
///
/// `scope` arguments carry extra conditions (query decorations such as
/// "not soft-deleted") that must hold for the addressed document to be
/// visible; an out-of-scope document behaves exactly like a missing one.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Run a composed query
    ///
    /// Populate instructions on the query are ignored here; see
    /// [`populate`](super::populate::populate).
    fn find(
        &self,
        collection: &str,
        query: &FindQuery,
    ) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    /// First document matching `filter`, in store order
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Document with `_id == id` that also satisfies `scope`
    fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        scope: &Filter,
        projection: &Projection,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send {
        let filter = Filter::by_id(id).merge(scope.clone());
        async move { self.find_one(collection, &filter, projection).await }
    }

    /// Number of documents matching `filter`
    fn count(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Insert a document, assigning `_id` when absent
    ///
    /// Returns the stored document.
    fn create(
        &self,
        collection: &str,
        doc: Document,
    ) -> impl Future<Output = StoreResult<Document>> + Send;

    /// Apply `update` to the in-scope document with `_id == id`
    ///
    /// Returns the post-update document, or `None` if nothing matched.
    fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        scope: &Filter,
        update: &Update,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Remove the in-scope document with `_id == id`
    ///
    /// Returns the removed document, or `None` if nothing matched.
    fn delete_by_id(
        &self,
        collection: &str,
        id: &str,
        scope: &Filter,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Declare a unique index over `fields`
    ///
    /// Idempotent. Subsequent writes that would duplicate the combination
    /// fail with a duplicate-key [`StoreError`].
    fn ensure_unique_index(
        &self,
        collection: &str,
        fields: &[&str],
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

//! Document store error types
//!
//! Every [`DocumentStore`](super::DocumentStore) call that fails surfaces a
//! [`StoreError`]. Handlers never retry on these; they are converted to an
//! API error at the HTTP boundary and otherwise propagated unchanged.
//!
//! # Example
//!
//! ```rust
//! use tourbook::repository::{StoreError, StoreErrorKind, StoreOperation};
//!
//! let error = StoreError::duplicate("tours", "name", "The Forest Hiker");
//! assert!(matches!(error.kind, StoreErrorKind::Duplicate));
//! assert_eq!(error.operation, StoreOperation::Create);
//! ```

use std::fmt;

/// Operation being performed when the store error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Query with filter, sort, projection and pagination
    Find,
    /// Lookup of a single document by `_id`
    FindById,
    /// Lookup of the first document matching a filter
    FindOne,
    /// Counting documents matching a filter
    Count,
    /// Inserting a document
    Create,
    /// Updating a document by `_id`
    Update,
    /// Deleting a document by `_id`
    Delete,
    /// Declaring a unique index
    EnsureIndex,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find"),
            Self::FindById => write!(f, "find_by_id"),
            Self::FindOne => write!(f, "find_one"),
            Self::Count => write!(f, "count"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::EnsureIndex => write!(f, "ensure_index"),
        }
    }
}

/// Category of store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// A unique index rejected the write
    Duplicate,
    /// The store could not be reached
    Connection,
    /// The store did not answer in time
    Timeout,
    /// The store rejected the operation
    Database,
    /// A document could not be converted to or from the store's format
    Serialization,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate"),
            Self::Connection => write!(f, "connection"),
            Self::Timeout => write!(f, "timeout"),
            Self::Database => write!(f, "database"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Structured store error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The operation being performed when the error occurred
    pub operation: StoreOperation,
    /// The category of error
    pub kind: StoreErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Collection the operation targeted
    pub collection: Option<String>,
    /// Offending `(field, value)` for duplicate-key errors
    pub duplicate_key: Option<(String, String)>,
}

impl StoreError {
    /// Create a new store error
    pub fn new(operation: StoreOperation, kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            collection: None,
            duplicate_key: None,
        }
    }

    /// A unique index already holds `value` for `field`
    pub fn duplicate(
        collection: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            operation: StoreOperation::Create,
            kind: StoreErrorKind::Duplicate,
            message: "Duplicate key".to_string(),
            collection: Some(collection.into()),
            duplicate_key: Some((field.into(), value.into())),
        }
    }

    /// The store could not be reached
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StoreOperation::Find, StoreErrorKind::Connection, message)
    }

    /// The store rejected the operation
    pub fn database(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Database, message)
    }

    /// A document could not be converted
    pub fn serialization(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Serialization, message)
    }

    /// Attach the collection name
    #[must_use]
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: StoreOperation) -> Self {
        self.operation = operation;
        self
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(collection) = &self.collection {
            write!(f, " [{}]", collection)?;
        }
        if let Some((field, value)) = &self.duplicate_key {
            write!(f, " ({} = {})", field, value)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {}

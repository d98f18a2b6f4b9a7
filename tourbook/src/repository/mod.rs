//! Document store abstraction
//!
//! Everything the API persists is a JSON object ([`Document`]) living in a
//! named collection. Handlers talk to storage only through the
//! [`DocumentStore`] capability trait.
//!
//! # Features
//!
//! - **Query model**: [`FindQuery`], [`Filter`], [`SortKey`], [`Projection`], [`Pagination`]
//! - **Population**: [`Populate`] instructions resolved by [`populate()`]
//! - **Backends**: [`MemoryStore`] always, `MongoStore` with the `mongodb` feature
//!
//! # Example
//!
//! ```rust,ignore
//! use tourbook::repository::{DocumentStore, Filter, FilterCondition, FindQuery, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let easy = FindQuery::new(Filter::new().and(FilterCondition::eq("difficulty", "easy".into())));
//! let tours = store.find("tours", &easy).await?;
//! ```

mod error;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;
mod populate;
mod query;
mod traits;

/// A stored document: a JSON object with a string `_id`
pub type Document = serde_json::Map<String, serde_json::Value>;

pub use error::{StoreError, StoreErrorKind, StoreOperation};
pub use memory::MemoryStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
pub use populate::{populate, Populate, PopulateKind};
pub use query::{
    compare_values, Filter, FilterCondition, FilterOperator, FindQuery, OrderDirection,
    Pagination, Projection, SortKey,
};
pub use traits::{DocumentStore, StoreResult, Update};

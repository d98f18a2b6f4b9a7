//! Query feature builder
//!
//! Shapes list requests into store queries. See [`QueryFeatures`] for the
//! step order and [`QueryDecoration`] for resource-level read rules.

mod decoration;
mod features;
mod params;

pub use decoration::{scope_filter, scope_populate, scope_projection, QueryDecoration};
pub use features::{
    QueryFeatures, QueryLimits, QueryMeta, DEFAULT_LIMIT, DEFAULT_SORT_FIELD, RESERVED_PARAMS,
};
pub use params::QueryParams;

//! Query model shared by every document store
//!
//! A [`FindQuery`] is a composed but unexecuted query: a conjunctive
//! [`Filter`], an ordered list of [`SortKey`]s, a [`Projection`], optional
//! [`Pagination`] and the [`Populate`] instructions to run on the results.
//! Stores translate it to their native form; [`MemoryStore`] evaluates it
//! directly using [`FilterCondition::matches`] and [`compare_values`].
//!
//! Comparison follows document-database conventions: an equality test
//! against an array field matches when any element matches, range operators
//! only compare values of the same type, and a missing field compares as
//! `null`.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tourbook::repository::{Filter, FilterCondition, FindQuery, Pagination, SortKey};
//!
//! let query = FindQuery::new(
//!     Filter::new()
//!         .and(FilterCondition::eq("difficulty", json!("easy")))
//!         .and(FilterCondition::gte("price", json!(500))),
//! )
//! .sorted_by(vec![SortKey::descending("price")])
//! .paginated(Pagination::page(2, 10));
//!
//! assert_eq!(query.pagination.map(|p| p.skip), Some(10));
//! ```
//!
//! [`MemoryStore`]: super::MemoryStore

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::populate::Populate;
use super::Document;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// One `(field, direction)` pair of a sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field to sort on
    pub field: String,
    /// Sort direction
    pub direction: OrderDirection,
}

impl SortKey {
    /// Ascending sort on `field`
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Ascending,
        }
    }

    /// Descending sort on `field`
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Descending,
        }
    }
}

/// Skip/limit window applied after filtering and sorting
///
/// ```rust
/// use tourbook::repository::Pagination;
///
/// let page3 = Pagination::page(3, 20);
/// assert_eq!(page3.skip, 40);
/// assert_eq!(page3.limit, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub skip: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create new pagination parameters
    #[must_use]
    pub const fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }

    /// Pagination for a 1-indexed page number
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        Self {
            skip: page_number.saturating_sub(1).saturating_mul(page_size),
            limit: page_size,
        }
    }
}

/// Comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Equal,
    /// Not equal to (also matches documents missing the field)
    NotEqual,
    /// Greater than
    GreaterThan,
    /// Greater than or equal to
    GreaterThanOrEqual,
    /// Less than
    LessThan,
    /// Less than or equal to
    LessThanOrEqual,
    /// Equal to any element of an array value
    In,
}

impl FilterOperator {
    /// Parse the bracketed operator of a `field[op]` query key
    ///
    /// Only the four range operators may be supplied by callers.
    pub fn from_query_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(Self::GreaterThan),
            "gte" => Some(Self::GreaterThanOrEqual),
            "lt" => Some(Self::LessThan),
            "lte" => Some(Self::LessThanOrEqual),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "eq"),
            Self::NotEqual => write!(f, "ne"),
            Self::GreaterThan => write!(f, "gt"),
            Self::GreaterThanOrEqual => write!(f, "gte"),
            Self::LessThan => write!(f, "lt"),
            Self::LessThanOrEqual => write!(f, "lte"),
            Self::In => write!(f, "in"),
        }
    }
}

/// A single `field <op> value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// Field name
    pub field: String,
    /// Comparison operator
    pub operator: FilterOperator,
    /// Value to compare against
    pub value: Value,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Equal, value)
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::NotEqual, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value)
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::LessThan, value)
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value)
    }

    /// `field` equals one of `values`
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOperator::In, Value::Array(values))
    }

    /// Evaluate this condition against a document
    pub fn matches(&self, doc: &Document) -> bool {
        let actual = doc.get(&self.field).unwrap_or(&Value::Null);
        match self.operator {
            FilterOperator::Equal => equality_matches(actual, &self.value),
            FilterOperator::NotEqual => !equality_matches(actual, &self.value),
            FilterOperator::In => match &self.value {
                Value::Array(candidates) => candidates
                    .iter()
                    .any(|candidate| equality_matches(actual, candidate)),
                _ => false,
            },
            FilterOperator::GreaterThan => range_matches(actual, &self.value, |o| o.is_gt()),
            FilterOperator::GreaterThanOrEqual => range_matches(actual, &self.value, |o| o.is_ge()),
            FilterOperator::LessThan => range_matches(actual, &self.value, |o| o.is_lt()),
            FilterOperator::LessThanOrEqual => range_matches(actual, &self.value, |o| o.is_le()),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn equality_matches(actual: &Value, expected: &Value) -> bool {
    if values_equal(actual, expected) {
        return true;
    }
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

fn range_matches(actual: &Value, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let comparable = |value: &Value| match (value, bound) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            accept(compare_values(value, bound))
        }
        _ => false,
    };
    match actual {
        Value::Array(items) => items.iter().any(comparable),
        other => comparable(other),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values used for sorting and range comparison
///
/// Values of different types order by type: null, numbers, strings,
/// objects, arrays, booleans.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Conjunction of filter conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// All conditions must hold
    pub conditions: Vec<FilterCondition>,
}

impl Filter {
    /// An empty filter matching every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on `_id`
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().and(FilterCondition::eq("_id", Value::String(id.into())))
    }

    /// Add a condition
    #[must_use]
    pub fn and(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append every condition of `other`
    #[must_use]
    pub fn merge(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    /// True when no condition is present
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate the conjunction against a document
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|condition| condition.matches(doc))
    }
}

/// Which fields a query returns
///
/// `_id` is always kept by an include projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Return only these fields
    Include(Vec<String>),
    /// Return every field except these
    Exclude(Vec<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Self::Exclude(Vec::new())
    }
}

impl Projection {
    /// Remove `fields` from the projection in either mode
    #[must_use]
    pub fn without(self, fields: &[&str]) -> Self {
        match self {
            Self::Include(mut included) => {
                included.retain(|field| !fields.contains(&field.as_str()));
                Self::Include(included)
            }
            Self::Exclude(mut excluded) => {
                for field in fields {
                    if !excluded.iter().any(|existing| existing == field) {
                        excluded.push((*field).to_string());
                    }
                }
                Self::Exclude(excluded)
            }
        }
    }

    /// Apply the projection to a document
    pub fn apply(&self, mut doc: Document) -> Document {
        match self {
            Self::Include(fields) => {
                doc.retain(|key, _| key == "_id" || fields.iter().any(|field| field == key));
                doc
            }
            Self::Exclude(fields) => {
                for field in fields {
                    doc.remove(field);
                }
                doc
            }
        }
    }
}

/// A composed, unexecuted query
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    /// Conjunctive filter
    pub filter: Filter,
    /// Ordered sort keys; empty means store order
    pub sort: Vec<SortKey>,
    /// Returned fields
    pub projection: Projection,
    /// Skip/limit window; `None` returns every match
    pub pagination: Option<Pagination>,
    /// Related documents to populate after the query runs
    pub populate: Vec<Populate>,
}

impl FindQuery {
    /// Query with the given filter and defaults for everything else
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Set the sort keys
    #[must_use]
    pub fn sorted_by(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    /// Set the projection
    #[must_use]
    pub fn projected(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Set the pagination window
    #[must_use]
    pub fn paginated(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_range_operators_compare_numbers() {
        let tour = doc(json!({"price": 497}));
        assert!(FilterCondition::gte("price", json!(497)).matches(&tour));
        assert!(!FilterCondition::gt("price", json!(497)).matches(&tour));
        assert!(FilterCondition::lt("price", json!(497.5)).matches(&tour));
        assert!(FilterCondition::lte("price", json!(497)).matches(&tour));
    }

    #[test]
    fn test_range_operators_skip_mismatched_types() {
        let tour = doc(json!({"price": "cheap"}));
        assert!(!FilterCondition::gte("price", json!(1)).matches(&tour));
        assert!(!FilterCondition::lt("price", json!(1)).matches(&tour));
    }

    #[test]
    fn test_missing_field_matches_nothing_but_ne() {
        let tour = doc(json!({"name": "The Sea Explorer"}));
        assert!(!FilterCondition::eq("colour", json!("red")).matches(&tour));
        assert!(!FilterCondition::gt("colour", json!(1)).matches(&tour));
        assert!(FilterCondition::ne("secretTour", json!(true)).matches(&tour));
    }

    #[test]
    fn test_equality_matches_array_elements() {
        let tour = doc(json!({"guides": ["u1", "u2"]}));
        assert!(FilterCondition::eq("guides", json!("u2")).matches(&tour));
        assert!(!FilterCondition::eq("guides", json!("u3")).matches(&tour));
    }

    #[test]
    fn test_in_operator() {
        let user = doc(json!({"_id": "b"}));
        assert!(FilterCondition::is_in("_id", vec![json!("a"), json!("b")]).matches(&user));
        assert!(!FilterCondition::is_in("_id", vec![json!("a")]).matches(&user));
    }

    #[test]
    fn test_integer_and_float_are_equal() {
        let tour = doc(json!({"duration": 5}));
        assert!(FilterCondition::eq("duration", json!(5.0)).matches(&tour));
    }

    #[test]
    fn test_compare_values_orders_types() {
        assert_eq!(compare_values(&Value::Null, &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    }

    #[test]
    fn test_include_projection_keeps_id() {
        let tour = doc(json!({"_id": "t1", "name": "A", "price": 1, "__v": 0}));
        let projected = Projection::Include(vec!["name".into()]).apply(tour);
        assert_eq!(projected.len(), 2);
        assert!(projected.contains_key("_id"));
        assert!(projected.contains_key("name"));
    }

    #[test]
    fn test_projection_without_hidden_fields() {
        let include = Projection::Include(vec!["name".into(), "password".into()]).without(&["password"]);
        assert_eq!(include, Projection::Include(vec!["name".into()]));

        let exclude = Projection::Exclude(vec!["__v".into()]).without(&["password", "__v"]);
        assert_eq!(
            exclude,
            Projection::Exclude(vec!["__v".into(), "password".into()])
        );
    }

    #[test]
    fn test_page_skip() {
        assert_eq!(Pagination::page(1, 100), Pagination::new(0, 100));
        assert_eq!(Pagination::page(2, 10), Pagination::new(10, 10));
    }
}

//! The query feature builder
//!
//! Turns request parameters into a [`FindQuery`] in a fixed order: filter,
//! sort, field projection, pagination, then the resource's decorations.
//! Nothing here talks to a store or fails; malformed input degrades to a
//! query that matches less (unknown fields) or falls back to defaults
//! (bad `page`/`limit`).

use serde_json::Value;

use super::decoration::QueryDecoration;
use super::params::QueryParams;
use crate::repository::{
    Filter, FilterCondition, FilterOperator, FindQuery, Pagination, Projection, SortKey,
};
use crate::schema::{number_value, VERSION_KEY};

/// Parameters that shape the query and never become filter predicates
pub const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Page size used when `limit` is absent or malformed
pub const DEFAULT_LIMIT: u64 = 100;

/// Sort applied when `sort` is absent
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Page-size policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Page size when the caller gives none
    pub default_limit: u64,
    /// Optional clamp on caller-supplied page sizes
    pub max_limit: Option<u64>,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: None,
        }
    }
}

/// Parsed request metadata returned next to the composed query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMeta {
    /// 1-indexed page number
    pub page: u64,
    /// Page size
    pub limit: u64,
    /// Documents skipped
    pub skip: u64,
    /// Sort keys in priority order
    pub sort: Vec<SortKey>,
    /// Predicates derived from the caller's parameters
    pub filter: Filter,
}

/// Builder from [`QueryParams`] to [`FindQuery`]
///
/// ```rust
/// use tourbook::query::{QueryFeatures, QueryParams};
/// use tourbook::repository::{OrderDirection, SortKey};
///
/// let params = QueryParams::parse("difficulty=easy&sort=-price,name&page=2&limit=10");
/// let (query, meta) = QueryFeatures::new(&params).shape(&[]);
///
/// assert_eq!(meta.sort, vec![SortKey::descending("price"), SortKey::ascending("name")]);
/// assert_eq!(meta.skip, 10);
/// assert_eq!(query.filter.conditions.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct QueryFeatures<'a> {
    params: &'a QueryParams,
    limits: QueryLimits,
    repeatable: &'static [&'static str],
    query: FindQuery,
    meta: QueryMeta,
}

fn is_safe_field(field: &str) -> bool {
    !field.is_empty() && !field.starts_with('$') && !field.contains('.')
}

fn parse_value(raw: &str) -> Value {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => number_value(n),
        _ => Value::String(raw.to_string()),
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}

/// Split `field[op]` into its parts; a bare key is an equality test
fn parse_key(key: &str) -> Option<(&str, FilterOperator)> {
    match key.split_once('[') {
        Some((field, rest)) => {
            let op = rest.strip_suffix(']')?;
            Some((field, FilterOperator::from_query_suffix(op)?))
        }
        None => Some((key, FilterOperator::Equal)),
    }
}

fn comma_separated(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|part| !part.is_empty())
}

impl<'a> QueryFeatures<'a> {
    /// Start from the caller's parameters with default limits
    pub fn new(params: &'a QueryParams) -> Self {
        let limits = QueryLimits::default();
        Self {
            params,
            limits,
            repeatable: &[],
            query: FindQuery::default(),
            meta: QueryMeta {
                page: 1,
                limit: limits.default_limit,
                skip: 0,
                sort: Vec::new(),
                filter: Filter::new(),
            },
        }
    }

    /// Use a different page-size policy
    #[must_use]
    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self.meta.limit = limits.default_limit;
        self
    }

    /// Fields whose repeated equality parameters match any of the values
    ///
    /// Every other repeated key keeps its last value.
    #[must_use]
    pub fn with_repeatable(mut self, fields: &'static [&'static str]) -> Self {
        self.repeatable = fields;
        self
    }

    /// Constrain results before caller predicates (e.g. a parent id)
    #[must_use]
    pub fn with_base_filter(mut self, base: Filter) -> Self {
        self.query.filter = base.merge(std::mem::take(&mut self.query.filter));
        self
    }

    /// Step 1: predicates from every non-reserved parameter
    #[must_use]
    pub fn filter(mut self) -> Self {
        let params = self.params;
        for (key, raw) in params.iter() {
            if RESERVED_PARAMS.contains(&key) {
                continue;
            }
            let Some((field, operator)) = parse_key(key) else {
                tracing::debug!(key, "dropping query parameter with unsupported operator");
                continue;
            };
            if !is_safe_field(field) {
                tracing::debug!(key, "dropping unsafe query parameter");
                continue;
            }
            let values = params.values(key);
            let condition = if operator == FilterOperator::Equal
                && values.len() > 1
                && self.repeatable.iter().any(|allowed| *allowed == field)
            {
                FilterCondition::is_in(field, values.iter().map(|v| parse_value(v)).collect())
            } else {
                FilterCondition::new(field, operator, parse_value(raw))
            };
            self.meta.filter.conditions.push(condition.clone());
            self.query.filter.conditions.push(condition);
        }
        self
    }

    /// Step 2: `sort=-price,name`, defaulting to newest first
    #[must_use]
    pub fn sort(mut self) -> Self {
        let keys: Vec<SortKey> = self
            .params
            .get("sort")
            .map(|raw| {
                comma_separated(raw)
                    .map(|part| match part.strip_prefix('-') {
                        Some(field) => SortKey::descending(field),
                        None => SortKey::ascending(part),
                    })
                    .filter(|key| is_safe_field(&key.field))
                    .collect()
            })
            .unwrap_or_default();

        let keys = if keys.is_empty() {
            vec![SortKey::descending(DEFAULT_SORT_FIELD)]
        } else {
            keys
        };
        self.meta.sort = keys.clone();
        self.query.sort = keys;
        self
    }

    /// Step 3: `fields=name,price`, otherwise everything but `__v`
    #[must_use]
    pub fn limit_fields(mut self) -> Self {
        let included: Vec<String> = self
            .params
            .get("fields")
            .map(|raw| {
                comma_separated(raw)
                    .filter(|field| is_safe_field(field))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        self.query.projection = if included.is_empty() {
            Projection::Exclude(vec![VERSION_KEY.to_string()])
        } else {
            Projection::Include(included)
        };
        self
    }

    /// Step 4: `page` and `limit`, skip = (page - 1) * limit
    #[must_use]
    pub fn paginate(mut self) -> Self {
        let page = parse_positive(self.params.get("page")).unwrap_or(1);
        let requested = parse_positive(self.params.get("limit")).unwrap_or(self.limits.default_limit);
        let limit = match self.limits.max_limit {
            Some(max) => requested.min(max),
            None => requested,
        };
        let pagination = Pagination::page(page, limit);

        self.meta.page = page;
        self.meta.limit = limit;
        self.meta.skip = pagination.skip;
        self.query.pagination = Some(pagination);
        self
    }

    /// Step 5: resource rules applied to every read
    #[must_use]
    pub fn decorate(mut self, decorations: &[QueryDecoration]) -> Self {
        for decoration in decorations {
            decoration.apply(&mut self.query);
        }
        self
    }

    /// Run every step in order and return the unexecuted query
    pub fn shape(self, decorations: &[QueryDecoration]) -> (FindQuery, QueryMeta) {
        self.filter()
            .sort()
            .limit_fields()
            .paginate()
            .decorate(decorations)
            .build()
    }

    /// Finish without running further steps
    pub fn build(self) -> (FindQuery, QueryMeta) {
        (self.query, self.meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::OrderDirection;
    use serde_json::json;

    fn shaped(raw: &str) -> (FindQuery, QueryMeta) {
        let params = QueryParams::parse(raw);
        QueryFeatures::new(&params).shape(&[])
    }

    #[test]
    fn test_repeatable_fields_match_any_value() {
        let params = QueryParams::parse("difficulty=easy&difficulty=medium&name=a&name=b");
        let (query, _) = QueryFeatures::new(&params)
            .with_repeatable(&["difficulty"])
            .shape(&[]);

        assert_eq!(
            query.filter.conditions,
            vec![
                FilterCondition::is_in("difficulty", vec![json!("easy"), json!("medium")]),
                FilterCondition::eq("name", json!("b")),
            ]
        );
    }

    #[test]
    fn test_reserved_params_never_filter() {
        let (query, meta) = shaped("page=2&sort=price&limit=5&fields=name&difficulty=easy");
        let fields: Vec<_> = query.filter.conditions.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["difficulty"]);
        assert_eq!(meta.filter, query.filter);
    }

    #[test]
    fn test_operators_and_numeric_parsing() {
        let (query, _) = shaped(
            "price%5Bgte%5D=500&duration%5Blt%5D=10&ratingsAverage%5Bgt%5D=4.5&maxGroupSize%5Blte%5D=20&difficulty=easy",
        );
        assert_eq!(
            query.filter.conditions,
            vec![
                FilterCondition::gte("price", json!(500)),
                FilterCondition::lt("duration", json!(10)),
                FilterCondition::gt("ratingsAverage", json!(4.5)),
                FilterCondition::lte("maxGroupSize", json!(20)),
                FilterCondition::eq("difficulty", json!("easy")),
            ]
        );
    }

    #[test]
    fn test_unsafe_and_unknown_operators_dropped() {
        let (query, _) = shaped("%24where=1&price%5Bne%5D=5&startLocation.type=Point&name%5Bregex=x");
        assert!(query.filter.is_empty());
    }

    #[test]
    fn test_sort_parsing() {
        let (_, meta) = shaped("sort=-price,name");
        assert_eq!(
            meta.sort,
            vec![SortKey::descending("price"), SortKey::ascending("name")]
        );

        let (query, meta) = shaped("");
        assert_eq!(meta.sort, vec![SortKey::descending("createdAt")]);
        assert_eq!(query.sort[0].direction, OrderDirection::Descending);

        let (_, meta) = shaped("sort=,");
        assert_eq!(meta.sort, vec![SortKey::descending("createdAt")]);
    }

    #[test]
    fn test_projection() {
        let (query, _) = shaped("fields=name,duration,%24where");
        assert_eq!(
            query.projection,
            Projection::Include(vec!["name".into(), "duration".into()])
        );

        let (query, _) = shaped("");
        assert_eq!(query.projection, Projection::Exclude(vec!["__v".into()]));
    }

    #[test]
    fn test_pagination_defaults_and_values() {
        let (query, meta) = shaped("page=2&limit=10");
        assert_eq!(query.pagination, Some(Pagination::new(10, 10)));
        assert_eq!((meta.page, meta.limit, meta.skip), (2, 10, 10));

        let (query, _) = shaped("");
        assert_eq!(query.pagination, Some(Pagination::new(0, 100)));

        let (query, _) = shaped("page=0&limit=-3");
        assert_eq!(query.pagination, Some(Pagination::new(0, 100)));
    }

    #[test]
    fn test_limit_is_unbounded_unless_clamped() {
        let params = QueryParams::parse("limit=100000");
        let (query, _) = QueryFeatures::new(&params).shape(&[]);
        assert_eq!(query.pagination.map(|p| p.limit), Some(100_000));

        let (query, meta) = QueryFeatures::new(&params)
            .with_limits(QueryLimits {
                default_limit: 100,
                max_limit: Some(500),
            })
            .shape(&[]);
        assert_eq!(query.pagination.map(|p| p.limit), Some(500));
        assert_eq!(meta.limit, 500);
    }

    #[test]
    fn test_base_filter_and_decorations() {
        let params = QueryParams::parse("rating=5");
        let (query, meta) = QueryFeatures::new(&params)
            .with_base_filter(Filter::new().and(FilterCondition::eq("tour", json!("t1"))))
            .shape(&[
                QueryDecoration::hide_where("secretTour", json!(true)),
                QueryDecoration::HideFields(vec!["createdAt"]),
            ]);

        assert_eq!(
            query.filter.conditions,
            vec![
                FilterCondition::eq("tour", json!("t1")),
                FilterCondition::eq("rating", json!(5)),
                FilterCondition::ne("secretTour", json!(true)),
            ]
        );
        assert_eq!(meta.filter.conditions.len(), 1);
        assert_eq!(
            query.projection,
            Projection::Exclude(vec!["__v".into(), "createdAt".into()])
        );
    }
}

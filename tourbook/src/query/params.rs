//! Raw query-string parameters

use axum::extract::{FromRequestParts, Query};
use http::request::Parts;

use crate::handlers::ApiError;

/// Query-string parameters in arrival order
///
/// Lookups see the last value of a repeated key, so `?sort=price&sort=name`
/// sorts by `name` alone. Every value is still kept for keys a resource
/// allows to repeat (see [`QueryParams::values`]).
///
/// ```rust
/// use tourbook::query::QueryParams;
///
/// let params = QueryParams::from_pairs([
///     ("sort".to_string(), "price".to_string()),
///     ("difficulty".to_string(), "easy".to_string()),
///     ("sort".to_string(), "name".to_string()),
/// ]);
/// assert_eq!(params.get("sort"), Some("name"));
/// assert_eq!(params.values("sort"), ["price", "name"]);
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect pairs, grouping repeated keys in arrival order
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut params = Self::new();
        for (key, value) in pairs {
            match params.entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => params.entries.push((key, vec![value])),
            }
        }
        params
    }

    /// Parse a raw query string such as `page=2&limit=10`
    pub fn parse(raw: &str) -> Self {
        let uri = format!("/?{}", raw);
        uri.parse::<http::Uri>()
            .ok()
            .and_then(|uri| Query::<Vec<(String, String)>>::try_from_uri(&uri).ok())
            .map(|Query(pairs)| Self::from_pairs(pairs))
            .unwrap_or_default()
    }

    /// Last value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values(key).last().map(String::as_str)
    }

    /// Every value of `key`, oldest first
    pub fn values(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    /// Insert or overwrite `key`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, vec![value.into()]));
    }

    /// Iterate over `(key, last value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(k, values)| {
            values.last().map(|v| (k.as_str(), v.as_str()))
        })
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no parameter was supplied
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| ApiError::bad_request(format!("Invalid query string: {}", e)))?;
        Ok(Self::from_pairs(pairs))
    }
}

//! In-process document store
//!
//! Keeps every collection in a `Vec` behind a single `tokio` `RwLock`.
//! Insertion order is the natural order, so ties under a sort key keep the
//! order documents were created in. Unique indexes are enforced on create
//! and update.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use crate::ids::new_document_id;

use super::error::{StoreError, StoreOperation};
use super::query::{compare_values, Filter, FindQuery, OrderDirection, Projection, SortKey};
use super::traits::{DocumentStore, StoreResult, Update};
use super::Document;

#[derive(Debug, Default)]
struct Collection {
    docs: Vec<Document>,
    unique_indexes: Vec<Vec<String>>,
}

impl Collection {
    /// First document other than `skip` that collides with `candidate` on a unique index
    fn duplicate_of(&self, candidate: &Document, skip: Option<usize>) -> Option<(String, String)> {
        for index in &self.unique_indexes {
            let Some(key) = index
                .iter()
                .map(|field| candidate.get(field))
                .collect::<Option<Vec<&Value>>>()
            else {
                continue;
            };

            let collides = self.docs.iter().enumerate().any(|(position, existing)| {
                Some(position) != skip
                    && index
                        .iter()
                        .zip(&key)
                        .all(|(field, value)| existing.get(field).is_some_and(|v| same_value(v, value)))
            });

            if collides {
                let value = key
                    .iter()
                    .map(|value| match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return Some((index.join(", "), value));
            }
        }
        None
    }

    fn position(&self, id: &str, scope: &Filter) -> Option<usize> {
        self.docs.iter().position(|doc| {
            doc.get("_id").and_then(Value::as_str) == Some(id) && scope.matches(doc)
        })
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

fn compare_docs(a: &Document, b: &Document, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let left = a.get(&key.field).unwrap_or(&Value::Null);
        let right = b.get(&key.field).unwrap_or(&Value::Null);
        let ordering = match key.direction {
            OrderDirection::Ascending => compare_values(left, right),
            OrderDirection::Descending => compare_values(right, left),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Document store held entirely in memory
///
/// Cloning shares the underlying collections.
///
/// ```rust,ignore
/// use tourbook::repository::{DocumentStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// let created = store.create("tours", serde_json::Map::new()).await?;
/// assert!(created.contains_key("_id"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(stored) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<&Document> = stored
            .docs
            .iter()
            .filter(|doc| query.filter.matches(doc))
            .collect();

        if !query.sort.is_empty() {
            matched.sort_by(|a, b| compare_docs(a, b, &query.sort));
        }

        let (skip, limit) = match query.pagination {
            Some(pagination) => (
                usize::try_from(pagination.skip).unwrap_or(usize::MAX),
                usize::try_from(pagination.limit).unwrap_or(usize::MAX),
            ),
            None => (0, usize::MAX),
        };

        let results: Vec<Document> = matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| query.projection.apply(doc.clone()))
            .collect();

        tracing::debug!(
            collection,
            conditions = query.filter.conditions.len(),
            returned = results.len(),
            "memory store find"
        );
        Ok(results)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|stored| {
            stored
                .docs
                .iter()
                .find(|doc| filter.matches(doc))
                .map(|doc| projection.apply(doc.clone()))
        }))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|stored| stored.docs.iter().filter(|doc| filter.matches(doc)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn create(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        let mut collections = self.collections.write().await;
        let stored = collections.entry(collection.to_string()).or_default();

        if !doc.contains_key("_id") {
            doc.insert(
                "_id".to_string(),
                Value::String(new_document_id()),
            );
        }

        if let Some((field, value)) = stored.duplicate_of(&doc, None) {
            return Err(StoreError::duplicate(collection, field, value));
        }

        stored.docs.push(doc.clone());
        tracing::debug!(collection, id = ?doc.get("_id"), "memory store create");
        Ok(doc)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        scope: &Filter,
        update: &Update,
    ) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(stored) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(position) = stored.position(id, scope) else {
            return Ok(None);
        };

        let mut candidate = stored.docs[position].clone();
        update.apply_to(&mut candidate);

        if let Some((field, value)) = stored.duplicate_of(&candidate, Some(position)) {
            return Err(StoreError::duplicate(collection, field, value)
                .with_operation(StoreOperation::Update));
        }

        stored.docs[position] = candidate.clone();
        Ok(Some(candidate))
    }

    async fn delete_by_id(
        &self,
        collection: &str,
        id: &str,
        scope: &Filter,
    ) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(stored) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(stored
            .position(id, scope)
            .map(|position| stored.docs.remove(position)))
    }

    async fn ensure_unique_index(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let stored = collections.entry(collection.to_string()).or_default();
        let index: Vec<String> = fields.iter().map(|field| (*field).to_string()).collect();
        if !stored.unique_indexes.contains(&index) {
            stored.unique_indexes.push(index);
        }
        Ok(())
    }
}

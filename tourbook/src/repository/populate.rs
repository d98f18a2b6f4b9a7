//! Related-document population
//!
//! A [`Populate`] instruction replaces id references with the referenced
//! documents (`guides: ["u1"]` becomes `guides: [{...}]`), or fills a
//! virtual field with the documents that point back at the parent
//! (`reviews` on a tour). Population happens after the primary query as
//! one extra read per instruction.

use std::collections::HashMap;

use serde_json::Value;

use super::query::{Filter, FilterCondition, FindQuery, Projection};
use super::traits::{DocumentStore, StoreResult};
use super::Document;

/// How the populated field relates to the target collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateKind {
    /// The field holds one id or an array of ids of target documents
    Reference,
    /// Target documents hold the parent id in `foreign_field`
    Virtual {
        /// Field on the target documents referencing the parent `_id`
        foreign_field: String,
    },
}

/// A population instruction
#[derive(Debug, Clone)]
pub struct Populate {
    /// Field on the parent document to fill
    pub path: String,
    /// Collection holding the related documents
    pub collection: String,
    /// Reference or virtual relationship
    pub kind: PopulateKind,
    /// Extra conditions the related documents must satisfy
    pub filter: Filter,
    /// Fields returned for related documents
    pub projection: Projection,
    /// One further level of population applied to the related documents
    pub nested: Vec<Populate>,
}

impl Populate {
    /// Replace the id(s) in `path` with documents from `collection`
    pub fn reference(path: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            collection: collection.into(),
            kind: PopulateKind::Reference,
            filter: Filter::new(),
            projection: Projection::default(),
            nested: Vec::new(),
        }
    }

    /// Fill `path` with documents of `collection` whose `foreign_field` is the parent id
    pub fn virtual_field(
        path: impl Into<String>,
        collection: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            collection: collection.into(),
            kind: PopulateKind::Virtual {
                foreign_field: foreign_field.into(),
            },
            filter: Filter::new(),
            projection: Projection::default(),
            nested: Vec::new(),
        }
    }

    /// Restrict the related documents' fields
    #[must_use]
    pub fn select(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Require extra conditions on related documents
    #[must_use]
    pub fn matching(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Populate the related documents too
    #[must_use]
    pub fn then(mut self, nested: Vec<Populate>) -> Self {
        self.nested = nested;
        self
    }
}

/// Run every instruction against `docs`, including one nested level
pub async fn populate<S: DocumentStore>(
    store: &S,
    docs: &mut [Document],
    instructions: &[Populate],
) -> StoreResult<()> {
    for instruction in instructions {
        let mut related = fetch_related(store, docs, instruction).await?;
        for nested in &instruction.nested {
            let nested_related = fetch_related(store, &related, nested).await?;
            attach(&mut related, nested, &nested_related);
        }
        attach(docs, instruction, &related);
    }
    Ok(())
}

fn referenced_ids(doc: &Document, path: &str) -> Vec<Value> {
    match doc.get(path) {
        Some(Value::String(id)) => vec![Value::String(id.clone())],
        Some(Value::Array(items)) => items.iter().filter(|v| v.is_string()).cloned().collect(),
        _ => Vec::new(),
    }
}

async fn fetch_related<S: DocumentStore>(
    store: &S,
    docs: &[Document],
    instruction: &Populate,
) -> StoreResult<Vec<Document>> {
    let (field, ids) = match &instruction.kind {
        PopulateKind::Reference => (
            "_id".to_string(),
            docs.iter()
                .flat_map(|doc| referenced_ids(doc, &instruction.path))
                .collect::<Vec<_>>(),
        ),
        PopulateKind::Virtual { foreign_field } => (
            foreign_field.clone(),
            docs.iter()
                .filter_map(|doc| doc.get("_id").cloned())
                .collect::<Vec<_>>(),
        ),
    };

    if ids.is_empty() {
        return Ok(Vec::new());
    }

    // The foreign field has to survive projection to group virtual results.
    let projection = match (&instruction.kind, instruction.projection.clone()) {
        (PopulateKind::Virtual { foreign_field }, Projection::Include(mut fields)) => {
            if !fields.contains(foreign_field) {
                fields.push(foreign_field.clone());
            }
            Projection::Include(fields)
        }
        (_, projection) => projection,
    };

    let query = FindQuery::new(
        Filter::new()
            .and(FilterCondition::is_in(field, ids))
            .merge(instruction.filter.clone()),
    )
    .projected(projection);

    store.find(&instruction.collection, &query).await
}

fn attach(docs: &mut [Document], instruction: &Populate, related: &[Document]) {
    match &instruction.kind {
        PopulateKind::Reference => {
            let by_id: HashMap<String, &Document> = related
                .iter()
                .filter_map(|doc| Some((doc.get("_id")?.as_str()?.to_string(), doc)))
                .collect();
            let lookup = |id: &Value| {
                id.as_str()
                    .and_then(|id| by_id.get(id))
                    .map(|doc| Value::Object((*doc).clone()))
            };

            for doc in docs.iter_mut() {
                let replacement = match doc.get(&instruction.path) {
                    Some(Value::Array(ids)) => Some(Value::Array(ids.iter().filter_map(lookup).collect())),
                    Some(id @ Value::String(_)) => Some(lookup(id).unwrap_or(Value::Null)),
                    _ => None,
                };
                if let Some(replacement) = replacement {
                    doc.insert(instruction.path.clone(), replacement);
                }
            }
        }
        PopulateKind::Virtual { foreign_field } => {
            let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
            for doc in related.iter() {
                if let Some(parent) = doc.get(foreign_field).and_then(Value::as_str) {
                    grouped
                        .entry(parent.to_string())
                        .or_default()
                        .push(Value::Object(doc.clone()));
                }
            }

            for doc in docs.iter_mut() {
                let children = doc
                    .get("_id")
                    .and_then(Value::as_str)
                    .and_then(|id| grouped.remove(id))
                    .unwrap_or_default();
                doc.insert(instruction.path.clone(), Value::Array(children));
            }
        }
    }
}

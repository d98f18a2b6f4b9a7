//! MongoDB-backed document store (requires `mongodb` feature)
//!
//! Documents round-trip through BSON unchanged: ids stay strings and dates
//! stay RFC 3339 strings, so queries built for [`MemoryStore`] behave the
//! same here.
//!
//! [`MemoryStore`]: super::MemoryStore

use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document as BsonDocument};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info};
use crate::ids::new_document_id;

use super::error::{StoreError, StoreErrorKind, StoreOperation};
use super::query::{Filter, FilterOperator, FindQuery, OrderDirection, Projection, SortKey};
use super::traits::{DocumentStore, StoreResult, Update};
use super::Document;

const DUPLICATE_KEY_CODE: i32 = 11000;

static DUP_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"dup key: \{ ?"?([\w.]+)"?: "?([^"}]*?)"? ?\}"#).expect("valid regex")
});

/// Document store backed by a MongoDB database
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and select `database`
    pub async fn connect(url: &str, database: &str) -> StoreResult<Self> {
        let options = ClientOptions::parse(url).await.map_err(|e| {
            error!("Failed to parse MongoDB connection string: {}", e);
            StoreError::connection(format!("Invalid connection string: {}", e))
        })?;
        let client = Client::with_options(options)
            .map_err(|e| StoreError::connection(format!("Failed to create client: {}", e)))?;

        info!(database, "Connected to MongoDB");
        Ok(Self {
            db: client.database(database),
        })
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.db.collection::<BsonDocument>(name)
    }
}

fn to_bson_document(doc: &Document, operation: StoreOperation) -> StoreResult<BsonDocument> {
    bson::to_document(doc).map_err(|e| StoreError::serialization(operation, e.to_string()))
}

fn from_bson_document(doc: BsonDocument, operation: StoreOperation) -> StoreResult<Document> {
    bson::from_document(doc).map_err(|e| StoreError::serialization(operation, e.to_string()))
}

fn filter_document(filter: &Filter, operation: StoreOperation) -> StoreResult<BsonDocument> {
    let mut clauses = Vec::with_capacity(filter.conditions.len());
    for condition in &filter.conditions {
        let value = bson::to_bson(&condition.value)
            .map_err(|e| StoreError::serialization(operation, e.to_string()))?;
        let predicate = match condition.operator {
            FilterOperator::Equal => value,
            FilterOperator::NotEqual => Bson::Document(bson::doc! { "$ne": value }),
            FilterOperator::GreaterThan => Bson::Document(bson::doc! { "$gt": value }),
            FilterOperator::GreaterThanOrEqual => Bson::Document(bson::doc! { "$gte": value }),
            FilterOperator::LessThan => Bson::Document(bson::doc! { "$lt": value }),
            FilterOperator::LessThanOrEqual => Bson::Document(bson::doc! { "$lte": value }),
            FilterOperator::In => Bson::Document(bson::doc! { "$in": value }),
        };
        let mut clause = BsonDocument::new();
        clause.insert(condition.field.clone(), predicate);
        clauses.push(Bson::Document(clause));
    }

    if clauses.is_empty() {
        Ok(BsonDocument::new())
    } else {
        Ok(bson::doc! { "$and": clauses })
    }
}

fn sort_document(sort: &[SortKey]) -> BsonDocument {
    let mut keys = BsonDocument::new();
    for key in sort {
        let direction = match key.direction {
            OrderDirection::Ascending => 1,
            OrderDirection::Descending => -1,
        };
        keys.insert(key.field.clone(), direction);
    }
    keys
}

fn projection_document(projection: &Projection) -> Option<BsonDocument> {
    let (fields, flag) = match projection {
        Projection::Include(fields) => (fields, 1),
        Projection::Exclude(fields) if fields.is_empty() => return None,
        Projection::Exclude(fields) => (fields, 0),
    };
    let mut spec = BsonDocument::new();
    for field in fields {
        spec.insert(field.clone(), flag);
    }
    Some(spec)
}

fn map_error(operation: StoreOperation, collection: &str, err: mongodb::error::Error) -> StoreError {
    let code = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    };

    if code == Some(DUPLICATE_KEY_CODE) {
        let message = err.to_string();
        let (field, value) = DUP_KEY
            .captures(&message)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .unwrap_or_else(|| ("unknown".to_string(), String::new()));
        return StoreError::duplicate(collection, field, value).with_operation(operation);
    }

    let kind = match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => StoreErrorKind::Connection,
        _ => StoreErrorKind::Database,
    };
    error!(collection, %operation, error = %err, "MongoDB operation failed");
    StoreError::new(operation, kind, err.to_string()).in_collection(collection)
}

impl DocumentStore for MongoStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<Vec<Document>> {
        let op = StoreOperation::Find;
        let filter = filter_document(&query.filter, op)?;
        let mut action = self.collection(collection).find(filter);
        if !query.sort.is_empty() {
            action = action.sort(sort_document(&query.sort));
        }
        if let Some(projection) = projection_document(&query.projection) {
            action = action.projection(projection);
        }
        if let Some(pagination) = query.pagination {
            action = action
                .skip(pagination.skip)
                .limit(i64::try_from(pagination.limit).unwrap_or(i64::MAX));
        }

        let cursor = action.await.map_err(|e| map_error(op, collection, e))?;
        let raw: Vec<BsonDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| map_error(op, collection, e))?;

        debug!(collection, returned = raw.len(), "mongodb find");
        raw.into_iter()
            .map(|doc| from_bson_document(doc, op))
            .collect()
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> StoreResult<Option<Document>> {
        let op = StoreOperation::FindOne;
        let filter = filter_document(filter, op)?;
        let mut action = self.collection(collection).find_one(filter);
        if let Some(projection) = projection_document(projection) {
            action = action.projection(projection);
        }
        action
            .await
            .map_err(|e| map_error(op, collection, e))?
            .map(|doc| from_bson_document(doc, op))
            .transpose()
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let op = StoreOperation::Count;
        let filter = filter_document(filter, op)?;
        self.collection(collection)
            .count_documents(filter)
            .await
            .map_err(|e| map_error(op, collection, e))
    }

    async fn create(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        let op = StoreOperation::Create;
        if !doc.contains_key("_id") {
            doc.insert(
                "_id".to_string(),
                serde_json::Value::String(new_document_id()),
            );
        }
        let raw = to_bson_document(&doc, op)?;
        self.collection(collection)
            .insert_one(raw)
            .await
            .map_err(|e| map_error(op, collection, e))?;
        Ok(doc)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        scope: &Filter,
        update: &Update,
    ) -> StoreResult<Option<Document>> {
        let op = StoreOperation::Update;
        let filter = filter_document(&Filter::by_id(id).merge(scope.clone()), op)?;

        let mut modifications = BsonDocument::new();
        if !update.set.is_empty() {
            modifications.insert("$set", to_bson_document(&update.set, op)?);
        }
        if !update.unset.is_empty() {
            let mut unset = BsonDocument::new();
            for field in &update.unset {
                unset.insert(field.clone(), "");
            }
            modifications.insert("$unset", unset);
        }
        if modifications.is_empty() {
            return self
                .find_one(collection, &Filter::by_id(id).merge(scope.clone()), &Projection::default())
                .await;
        }

        self.collection(collection)
            .find_one_and_update(filter, modifications)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_error(op, collection, e))?
            .map(|doc| from_bson_document(doc, op))
            .transpose()
    }

    async fn delete_by_id(
        &self,
        collection: &str,
        id: &str,
        scope: &Filter,
    ) -> StoreResult<Option<Document>> {
        let op = StoreOperation::Delete;
        let filter = filter_document(&Filter::by_id(id).merge(scope.clone()), op)?;
        self.collection(collection)
            .find_one_and_delete(filter)
            .await
            .map_err(|e| map_error(op, collection, e))?
            .map(|doc| from_bson_document(doc, op))
            .transpose()
    }

    async fn ensure_unique_index(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        let op = StoreOperation::EnsureIndex;
        let mut keys = BsonDocument::new();
        for field in fields {
            keys.insert(*field, 1);
        }
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection(collection)
            .create_index(index)
            .await
            .map_err(|e| map_error(op, collection, e))?;
        Ok(())
    }
}

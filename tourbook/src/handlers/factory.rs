//! Generic resource handlers
//!
//! [`ResourceHandlers`] turns any [`Resource`] into the five REST
//! operations. The operations are plain async methods (usable from other
//! handlers and tests); the free functions below wrap them as axum
//! handlers:
//!
//! | Handler | Route shape | Success |
//! |---|---|---|
//! | [`list`] / [`list_nested`] | `GET /tours`, `GET /tours/{id}/reviews` | 200 with `results` |
//! | [`get_one`] / [`get_one_nested`] | `GET /tours/{id}`, `GET /tours/{id}/reviews/{review_id}` | 200 |
//! | [`create`] / [`create_nested`] | `POST /tours`, `POST /tours/{id}/reviews` | 201 |
//! | [`update`] / [`update_nested`] | `PATCH /tours/{id}` | 200 with the post-update document |
//! | [`delete`] / [`delete_nested`] | `DELETE /tours/{id}` | 204, no body |
//!
//! The nested variants constrain every operation to documents whose
//! parent link matches the path. Authentication and role checks are route
//! layers; nothing here knows about them beyond reading the identity that
//! owns created documents.
//!
//! ```rust,ignore
//! use tourbook::handlers::factory;
//! use tourbook::resources::Tour;
//!
//! let tours = Router::new()
//!     .route("/", get(factory::list::<Tour, S>).post(factory::create::<Tour, S>))
//!     .route("/{id}", get(factory::get_one::<Tour, S>));
//! ```

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequest, Path, Request, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use super::error::{ApiError, ApiOperation};
use super::response::{ItemResponse, ListResponse};
use crate::context::RequestContext;
use crate::query::{
    scope_filter, scope_populate, scope_projection, QueryDecoration, QueryFeatures, QueryLimits,
    QueryParams,
};
use crate::repository::{populate, Document, DocumentStore, Filter, FilterCondition, Update};
use crate::resources::Resource;
use crate::state::AppState;

/// A JSON object request body
///
/// Malformed JSON and non-object bodies are rejected with 400.
#[derive(Debug, Clone)]
pub struct Payload(pub Document);

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        match value {
            Value::Object(doc) => Ok(Self(doc)),
            _ => Err(ApiError::bad_request("Request body must be a JSON object")),
        }
    }
}

/// CRUD operations for one resource over one store
pub struct ResourceHandlers<R, S> {
    store: S,
    limits: QueryLimits,
    _resource: PhantomData<fn() -> R>,
}

impl<R, S: Clone> Clone for ResourceHandlers<R, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            limits: self.limits,
            _resource: PhantomData,
        }
    }
}

impl<R: Resource, S: DocumentStore> FromRef<AppState<S>> for ResourceHandlers<R, S> {
    fn from_ref(state: &AppState<S>) -> Self {
        Self::new(state.store().clone()).with_limits(state.query_limits())
    }
}

impl<R: Resource, S: DocumentStore> ResourceHandlers<R, S> {
    /// Handlers over `store` with default page-size limits
    pub fn new(store: S) -> Self {
        Self {
            store,
            limits: QueryLimits::default(),
            _resource: PhantomData,
        }
    }

    /// Use a different page-size policy
    #[must_use]
    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    fn present_all(docs: &mut [Document]) {
        docs.iter_mut().for_each(R::present);
    }

    fn parent_condition(parent: Option<&str>) -> Option<FilterCondition> {
        let link = R::parent()?;
        let parent_id = parent?;
        Some(FilterCondition::eq(link.field, Value::String(parent_id.to_string())))
    }

    /// Visibility scope plus the parent constraint, if any
    fn scope(decorations: &[QueryDecoration], parent: Option<&str>) -> Filter {
        let scope = scope_filter(decorations);
        match Self::parent_condition(parent) {
            Some(condition) => scope.and(condition),
            None => scope,
        }
    }

    /// Shaped, decorated list; `parent` restricts nested resources
    pub async fn list(&self, params: &QueryParams, parent: Option<&str>) -> Result<Vec<Document>, ApiError> {
        let mut features = QueryFeatures::new(params)
            .with_limits(self.limits)
            .with_repeatable(R::repeatable_params());
        if let Some(condition) = Self::parent_condition(parent) {
            features = features.with_base_filter(Filter::new().and(condition));
        }
        let (query, meta) = features.shape(&R::read_decorations());
        tracing::debug!(
            resource = R::NAME,
            page = meta.page,
            limit = meta.limit,
            conditions = query.filter.conditions.len(),
            "list query shaped"
        );

        let mut docs = self
            .store
            .find(R::COLLECTION, &query)
            .await
            .map_err(|e| ApiError::from(e).with_operation(ApiOperation::List))?;
        populate(&self.store, &mut docs, &query.populate).await?;
        Self::present_all(&mut docs);
        Ok(docs)
    }

    /// One visible document, with get-one population
    pub async fn get_one(&self, id: &str, parent: Option<&str>) -> Result<Document, ApiError> {
        let decorations = R::read_decorations();
        let doc = self
            .store
            .find_by_id(
                R::COLLECTION,
                id,
                &Self::scope(&decorations, parent),
                &scope_projection(&decorations),
            )
            .await?
            .ok_or_else(|| ApiError::not_found(R::NAME, id))?;

        let mut docs = [doc];
        let mut instructions = scope_populate(&decorations);
        instructions.extend(R::populate_on_get());
        populate(&self.store, &mut docs, &instructions).await?;
        Self::present_all(&mut docs);
        let [doc] = docs;
        Ok(doc)
    }

    /// Validate and insert a complete payload
    ///
    /// Nothing reaches the store when validation fails.
    pub async fn create(&self, payload: Document) -> Result<Document, ApiError> {
        let mut doc = R::schema()
            .validate_create(payload)
            .map_err(|e| ApiError::from(e).with_operation(ApiOperation::Create))?;
        R::prepare(&mut doc);

        let created = self.store.create(R::COLLECTION, doc).await?;
        let mut created = scope_projection(&R::read_decorations()).apply(created);
        R::present(&mut created);

        tracing::info!(
            resource = R::NAME,
            id = created.get("_id").and_then(|id| id.as_str()).unwrap_or_default(),
            "document created"
        );
        Ok(created)
    }

    /// Create under a parent
    ///
    /// The path parent and the owner replace whatever the payload names.
    pub async fn create_nested(
        &self,
        mut payload: Document,
        parent: &str,
        owner: Option<&str>,
    ) -> Result<Document, ApiError> {
        if let Some(link) = R::parent() {
            payload.insert(link.field.to_string(), Value::String(parent.to_string()));
        }
        stamp_owner::<R>(&mut payload, owner);
        self.create(payload).await
    }

    /// Validate and apply a partial payload to a visible document
    pub async fn update(
        &self,
        id: &str,
        payload: Document,
        parent: Option<&str>,
    ) -> Result<Document, ApiError> {
        let mut changes = R::schema()
            .validate_update(payload)
            .map_err(|e| ApiError::from(e).with_operation(ApiOperation::Update))?;
        R::prepare_update(&mut changes);

        let decorations = R::read_decorations();
        let updated = self
            .store
            .update_by_id(
                R::COLLECTION,
                id,
                &Self::scope(&decorations, parent),
                &Update::from_changes(changes),
            )
            .await?
            .ok_or_else(|| ApiError::not_found(R::NAME, id).with_operation(ApiOperation::Update))?;

        let mut docs = [scope_projection(&decorations).apply(updated)];
        populate(&self.store, &mut docs, &scope_populate(&decorations)).await?;
        Self::present_all(&mut docs);
        let [doc] = docs;
        Ok(doc)
    }

    /// Remove a visible document
    pub async fn delete(&self, id: &str, parent: Option<&str>) -> Result<(), ApiError> {
        let scope = Self::scope(&R::read_decorations(), parent);
        self.store
            .delete_by_id(R::COLLECTION, id, &scope)
            .await?
            .ok_or_else(|| ApiError::not_found(R::NAME, id).with_operation(ApiOperation::Delete))?;
        tracing::info!(resource = R::NAME, id = %id, "document deleted");
        Ok(())
    }
}

/// Record `owner` on resources that track who created them
fn stamp_owner<R: Resource>(payload: &mut Document, owner: Option<&str>) {
    if let (Some(field), Some(owner)) = (R::owner(), owner) {
        payload.insert(field.to_string(), Value::String(owner.to_string()));
    }
}

/// `GET /` for any resource
pub async fn list<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    context: RequestContext,
    params: QueryParams,
) -> Result<ListResponse<Document>, ApiError> {
    let docs = handlers.list(&params, None).await?;
    Ok(ListResponse::new(docs).with_requested_at(context.requested_at_string()))
}

/// `GET /` under a parent (`/tours/{id}/reviews`)
pub async fn list_nested<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    Path(parent): Path<String>,
    context: RequestContext,
    params: QueryParams,
) -> Result<ListResponse<Document>, ApiError> {
    let docs = handlers.list(&params, Some(&parent)).await?;
    Ok(ListResponse::new(docs).with_requested_at(context.requested_at_string()))
}

/// `GET /{id}`
pub async fn get_one<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    Path(id): Path<String>,
) -> Result<ItemResponse<Document>, ApiError> {
    Ok(ItemResponse::new(handlers.get_one(&id, None).await?))
}

/// `GET /{id}` under a parent
pub async fn get_one_nested<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    Path((parent, id)): Path<(String, String)>,
) -> Result<ItemResponse<Document>, ApiError> {
    Ok(ItemResponse::new(handlers.get_one(&id, Some(&parent)).await?))
}

/// `POST /`
///
/// On owned resources the authenticated user is always the owner.
pub async fn create<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    context: RequestContext,
    Payload(mut payload): Payload,
) -> Result<ItemResponse<Document>, ApiError> {
    let owner = context.identity.as_ref().map(|identity| identity.id());
    stamp_owner::<R>(&mut payload, owner);
    Ok(ItemResponse::created(handlers.create(payload).await?))
}

/// `POST /` under a parent
pub async fn create_nested<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    Path(parent): Path<String>,
    context: RequestContext,
    Payload(payload): Payload,
) -> Result<ItemResponse<Document>, ApiError> {
    let owner = context.identity.as_ref().map(|identity| identity.id());
    let created = handlers.create_nested(payload, &parent, owner).await?;
    Ok(ItemResponse::created(created))
}

/// `PATCH /{id}`
pub async fn update<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    Path(id): Path<String>,
    Payload(payload): Payload,
) -> Result<ItemResponse<Document>, ApiError> {
    Ok(ItemResponse::new(handlers.update(&id, payload, None).await?))
}

/// `PATCH /{id}` under a parent
pub async fn update_nested<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    Path((parent, id)): Path<(String, String)>,
    Payload(payload): Payload,
) -> Result<ItemResponse<Document>, ApiError> {
    Ok(ItemResponse::new(handlers.update(&id, payload, Some(&parent)).await?))
}

/// `DELETE /{id}`
pub async fn delete<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    handlers.delete(&id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /{id}` under a parent
pub async fn delete_nested<R: Resource, S: DocumentStore>(
    State(handlers): State<ResourceHandlers<R, S>>,
    Path((parent, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    handlers.delete(&id, Some(&parent)).await?;
    Ok(StatusCode::NO_CONTENT)
}

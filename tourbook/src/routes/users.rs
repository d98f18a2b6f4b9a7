//! `/api/v1/users`
//!
//! Authentication flows are public. Everything after them requires a
//! session, and the factory routes additionally require the admin role.

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::Value;

use crate::auth::{controller, protect, restrict_to, Roles, NOT_LOGGED_IN};
use crate::context::{Identity, RequestContext};
use crate::handlers::{factory, ApiError, ItemResponse, Payload, ResourceHandlers};
use crate::repository::{Document, DocumentStore, Filter, Update};
use crate::resources::{Resource, User};
use crate::state::AppState;

/// Fields a user may change on their own account
pub const SELF_UPDATABLE: [&str; 2] = ["name", "email"];

const NOT_FOR_PASSWORDS: &str =
    "This route is not for password updates. Please use /updateMyPassword.";

fn identity(context: RequestContext) -> Result<Identity, ApiError> {
    context
        .identity
        .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))
}

/// `GET /users/me`
pub async fn get_me<S: DocumentStore>(
    State(handlers): State<ResourceHandlers<User, S>>,
    context: RequestContext,
) -> Result<ItemResponse<Document>, ApiError> {
    let identity = identity(context)?;
    Ok(ItemResponse::new(handlers.get_one(identity.id(), None).await?))
}

/// `PATCH /users/updateMe`
pub async fn update_me<S: DocumentStore>(
    State(handlers): State<ResourceHandlers<User, S>>,
    context: RequestContext,
    Payload(payload): Payload,
) -> Result<ItemResponse<Document>, ApiError> {
    let identity = identity(context)?;
    if payload.contains_key("password") || payload.contains_key("passwordConfirm") {
        return Err(ApiError::bad_request(NOT_FOR_PASSWORDS));
    }

    let changes: Document = payload
        .into_iter()
        .filter(|(key, _)| SELF_UPDATABLE.contains(&key.as_str()))
        .collect();
    let updated = handlers.update(identity.id(), changes, None).await?;
    tracing::info!(user = %identity.id(), "profile updated");
    Ok(ItemResponse::new(updated))
}

/// `DELETE /users/deleteMe`: deactivate the account
pub async fn delete_me<S: DocumentStore>(
    State(state): State<AppState<S>>,
    context: RequestContext,
) -> Result<StatusCode, ApiError> {
    let identity = identity(context)?;
    state
        .store()
        .update_by_id(
            User::COLLECTION,
            identity.id(),
            &Filter::new(),
            &Update::new().set("active", Value::Bool(false)),
        )
        .await?;
    tracing::info!(user = %identity.id(), "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /users`: accounts are only created through signup
pub async fn create_user() -> ApiError {
    ApiError::internal("This route is not defined! Please use /signup instead")
}

/// Build the users router
pub fn router<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let admin = Router::new()
        .route("/", get(factory::list::<User, S>).post(create_user))
        .route(
            "/{id}",
            get(factory::get_one::<User, S>)
                .patch(factory::update::<User, S>)
                .delete(factory::delete::<User, S>),
        )
        .route_layer(from_fn_with_state(Roles(&["admin"]), restrict_to));

    let account = Router::new()
        .route("/updateMyPassword", patch(controller::update_my_password::<S>))
        .route("/me", get(get_me::<S>))
        .route("/updateMe", patch(update_me::<S>))
        .route("/deleteMe", delete(delete_me::<S>))
        .merge(admin)
        .route_layer(from_fn_with_state(state.clone(), protect::<S>));

    Router::new()
        .route("/signup", post(controller::signup::<S>))
        .route("/login", post(controller::login::<S>))
        .route("/logout", get(controller::logout))
        .route("/forgotPassword", post(controller::forgot_password::<S>))
        .route("/resetPassword/{token}", patch(controller::reset_password::<S>))
        .merge(account)
}

//! `/api/v1/reviews`

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::auth::{protect, restrict_to, Roles};
use crate::handlers::factory;
use crate::repository::DocumentStore;
use crate::resources::Review;
use crate::state::AppState;

/// Build the reviews router; every route requires a session
pub fn router<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let authors = Router::new()
        .route("/", post(factory::create::<Review, S>))
        .route_layer(from_fn_with_state(Roles(&["user"]), restrict_to));

    let moderators = Router::new()
        .route(
            "/{id}",
            patch(factory::update::<Review, S>).delete(factory::delete::<Review, S>),
        )
        .route_layer(from_fn_with_state(Roles(&["user", "admin"]), restrict_to));

    Router::new()
        .route("/", get(factory::list::<Review, S>))
        .route("/{id}", get(factory::get_one::<Review, S>))
        .merge(authors)
        .merge(moderators)
        .route_layer(from_fn_with_state(state.clone(), protect::<S>))
}

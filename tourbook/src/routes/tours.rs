//! `/api/v1/tours`

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::analytics;
use crate::auth::{protect, restrict_to, Roles};
use crate::handlers::factory;
use crate::repository::DocumentStore;
use crate::resources::{Review, Tour};
use crate::state::AppState;

/// Build the tours router, including reviews nested under a tour
///
/// Nested review routes only reach reviews whose `tour` is the path id.
pub fn router<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let staff = Router::new()
        .route("/", post(factory::create::<Tour, S>))
        .route(
            "/{id}",
            patch(factory::update::<Tour, S>).delete(factory::delete::<Tour, S>),
        )
        .route_layer(from_fn_with_state(Roles(&["admin", "lead-guide"]), restrict_to))
        .route_layer(from_fn_with_state(state.clone(), protect::<S>));

    let planning = Router::new()
        .route("/monthly-plan/{year}", get(analytics::get_monthly_plan::<S>))
        .route_layer(from_fn_with_state(
            Roles(&["admin", "lead-guide", "guide"]),
            restrict_to,
        ))
        .route_layer(from_fn_with_state(state.clone(), protect::<S>));

    let review_authors = Router::new()
        .route("/{id}/reviews", post(factory::create_nested::<Review, S>))
        .route_layer(from_fn_with_state(Roles(&["user"]), restrict_to));

    let review_moderators = Router::new()
        .route(
            "/{id}/reviews/{review_id}",
            patch(factory::update_nested::<Review, S>).delete(factory::delete_nested::<Review, S>),
        )
        .route_layer(from_fn_with_state(Roles(&["user", "admin"]), restrict_to));

    let reviews = Router::new()
        .route("/{id}/reviews", get(factory::list_nested::<Review, S>))
        .route("/{id}/reviews/{review_id}", get(factory::get_one_nested::<Review, S>))
        .merge(review_authors)
        .merge(review_moderators)
        .route_layer(from_fn_with_state(state.clone(), protect::<S>));

    Router::new()
        .route("/top-5-cheap", get(analytics::top_five_cheap::<S>))
        .route("/tour-stats", get(analytics::get_tour_stats::<S>))
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(analytics::get_tours_within::<S>),
        )
        .route("/distances/{latlng}/unit/{unit}", get(analytics::get_distances::<S>))
        .route("/", get(factory::list::<Tour, S>))
        .route("/{id}", get(factory::get_one::<Tour, S>))
        .merge(planning)
        .merge(staff)
        .merge(reviews)
}

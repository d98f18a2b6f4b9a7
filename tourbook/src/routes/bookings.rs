//! `/api/v1/bookings`

use axum::{
    middleware::from_fn_with_state,
    routing::get,
    Router,
};

use crate::auth::{protect, restrict_to, Roles};
use crate::handlers::factory;
use crate::payments;
use crate::repository::DocumentStore;
use crate::resources::Booking;
use crate::state::AppState;

/// Build the bookings router
///
/// Any signed-in user may open a checkout session; booking records are
/// managed by admins and lead guides.
pub fn router<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let managers = Router::new()
        .route(
            "/",
            get(factory::list::<Booking, S>).post(factory::create::<Booking, S>),
        )
        .route(
            "/{id}",
            get(factory::get_one::<Booking, S>)
                .patch(factory::update::<Booking, S>)
                .delete(factory::delete::<Booking, S>),
        )
        .route_layer(from_fn_with_state(Roles(&["admin", "lead-guide"]), restrict_to));

    Router::new()
        .route("/checkout-session/{tourId}", get(payments::checkout_session::<S>))
        .merge(managers)
        .route_layer(from_fn_with_state(state.clone(), protect::<S>))
}

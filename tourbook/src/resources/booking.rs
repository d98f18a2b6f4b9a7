//! Bookings

use once_cell::sync::Lazy;
use serde_json::json;

use super::{embedded_projection, Resource, Tour, User};
use crate::query::QueryDecoration;
use crate::repository::{Populate, Projection};
use crate::schema::{Field, Schema};

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(Field::reference("tour").required("Booking must belong to a Tour!"))
        .field(Field::reference("user").required("Booking must belong to a User!"))
        .field(Field::number("price").required("Booking must have a price."))
        .field(Field::date("createdAt").default_now())
        .field(Field::boolean("paid").default_value(json!(true)))
});

/// The `bookings` resource
#[derive(Debug, Clone, Copy, Default)]
pub struct Booking;

impl Resource for Booking {
    const NAME: &'static str = "Booking";
    const COLLECTION: &'static str = "bookings";

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn decorations() -> Vec<QueryDecoration> {
        vec![
            QueryDecoration::Populate(
                Populate::reference("user", User::COLLECTION).select(embedded_projection::<User>(&[])),
            ),
            QueryDecoration::Populate(
                Populate::reference("tour", Tour::COLLECTION)
                    .select(Projection::Include(vec!["name".into()])),
            ),
        ]
    }
}

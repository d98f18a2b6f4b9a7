//! Reviews, nested under tours

use once_cell::sync::Lazy;

use super::{ParentLink, Resource, User};
use crate::query::QueryDecoration;
use crate::repository::{Populate, Projection};
use crate::schema::{Field, Schema};

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(
            Field::string("review")
                .required("Review can not be empty!")
                .trim(),
        )
        .field(
            Field::number("rating")
                .min(1.0, "Rating must be above 1.0")
                .max(5.0, "Rating must be below 5.0"),
        )
        .field(Field::date("createdAt").default_now())
        .field(Field::reference("tour").required("Review must belong to a tour."))
        .field(Field::reference("user").required("Review must belong to a user"))
        .unique_index(&["tour", "user"])
});

/// The `reviews` resource
#[derive(Debug, Clone, Copy, Default)]
pub struct Review;

impl Review {
    /// The author's name and photo
    pub fn author_population() -> Populate {
        Populate::reference("user", User::COLLECTION)
            .select(Projection::Include(vec!["name".into(), "photo".into()]))
    }
}

impl Resource for Review {
    const NAME: &'static str = "Review";
    const COLLECTION: &'static str = "reviews";

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn decorations() -> Vec<QueryDecoration> {
        vec![QueryDecoration::Populate(Self::author_population())]
    }

    fn parent() -> Option<ParentLink> {
        Some(ParentLink { field: "tour" })
    }

    fn owner() -> Option<&'static str> {
        Some("user")
    }
}

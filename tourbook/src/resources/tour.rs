//! Tours

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::{embedded_projection, Resource, User};
use crate::query::QueryDecoration;
use crate::repository::{Document, Filter, FilterCondition, Populate, Projection};
use crate::schema::{number_value, Field, FieldKind, Schema};

fn geo_fields(with_day: bool) -> Vec<Field> {
    let mut fields = vec![
        Field::string("type")
            .default_value(json!("Point"))
            .one_of(&["Point"], "Location type must be Point"),
        Field::array("coordinates", FieldKind::Number),
        Field::string("address"),
        Field::string("description"),
    ];
    if with_day {
        fields.push(Field::number("day"));
    }
    fields
}

fn discount_below_price(discount: &Value, doc: &Document) -> bool {
    match (discount.as_f64(), doc.get("price").and_then(Value::as_f64)) {
        (Some(discount), Some(price)) => discount < price,
        _ => true,
    }
}

/// Filters that may repeat (`?difficulty=easy&difficulty=medium`)
pub const REPEATABLE_PARAMS: [&str; 6] = [
    "duration",
    "ratingsQuantity",
    "ratingsAverage",
    "maxGroupSize",
    "difficulty",
    "price",
];

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(
            Field::string("name")
                .required("A tour must have a name")
                .unique()
                .trim()
                .max_length(40, "A tour name must have less or equal then 40 characters")
                .min_length(10, "A tour name must have more or equal then 10 characters"),
        )
        .field(Field::string("slug"))
        .field(Field::number("duration").required("A tour must have a duration"))
        .field(Field::number("maxGroupSize").required("A tour must have a group size"))
        .field(
            Field::string("difficulty")
                .required("A tour must have a difficulty")
                .one_of(
                    &["easy", "medium", "difficult"],
                    "Difficulty is either: easy, medium, difficult",
                ),
        )
        .field(
            Field::number("ratingsAverage")
                .default_value(json!(4.5))
                .min(1.0, "Rating must be above 1.0")
                .max(5.0, "Rating must be below 5.0")
                .round(1),
        )
        .field(Field::number("ratingsQuantity").default_value(json!(0)))
        .field(Field::number("price").required("A tour must have a price"))
        .field(Field::number("priceDiscount").check(
            discount_below_price,
            "Discount price ({VALUE}) should be below regular price",
        ))
        .field(
            Field::string("summary")
                .required("A tour must have a description")
                .trim(),
        )
        .field(Field::string("description").trim())
        .field(Field::string("imageCover").required("A tour must have a cover image"))
        .field(Field::array("images", FieldKind::String))
        .field(Field::date("createdAt").default_now().hidden())
        .field(Field::array("startDates", FieldKind::Date))
        .field(Field::boolean("secretTour").default_value(json!(false)))
        .field(Field::object("startLocation", geo_fields(false)))
        .field(Field::array("locations", FieldKind::Object(geo_fields(true))))
        .field(Field::array("guides", FieldKind::Id))
});

/// The `tours` resource
#[derive(Debug, Clone, Copy, Default)]
pub struct Tour;

impl Tour {
    /// Guides embedded in tours: active users without bookkeeping fields
    pub fn guides_population() -> Populate {
        Populate::reference("guides", User::COLLECTION)
            .select(embedded_projection::<User>(&["passwordChangedAt"]))
            .matching(Filter::new().and(FilterCondition::ne("active", json!(false))))
    }

    /// Reviews pointing at a tour, with their author's name and photo
    pub fn reviews_population() -> Populate {
        Populate::virtual_field("reviews", super::Review::COLLECTION, "tour")
            .select(Projection::default().without(&["__v"]))
            .then(vec![super::Review::author_population()])
    }
}

impl Resource for Tour {
    const NAME: &'static str = "Tour";
    const COLLECTION: &'static str = "tours";

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn repeatable_params() -> &'static [&'static str] {
        &REPEATABLE_PARAMS
    }

    fn decorations() -> Vec<QueryDecoration> {
        vec![
            QueryDecoration::hide_where("secretTour", json!(true)),
            QueryDecoration::Populate(Self::guides_population()),
        ]
    }

    fn populate_on_get() -> Vec<Populate> {
        vec![Self::reviews_population()]
    }

    fn prepare(doc: &mut Document) {
        if let Some(name) = doc.get("name").and_then(Value::as_str) {
            let slug = slug::slugify(name);
            doc.insert("slug".to_string(), Value::String(slug));
        }
    }

    fn prepare_update(changes: &mut Document) {
        Self::prepare(changes);
    }

    fn present(doc: &mut Document) {
        if let Some(duration) = doc.get("duration").and_then(Value::as_f64) {
            doc.insert("durationWeeks".to_string(), number_value(duration / 7.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Document {
        let Value::Object(map) = json!({
            "name": "  The Forest Hiker  ",
            "duration": "5",
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
            "startLocation": {"coordinates": [-115.570154, 51.178456], "address": "Banff, CAN"},
            "locations": [{"coordinates": [-116.214531, 51.417611], "day": 1}]
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn test_create_applies_defaults_and_casts() {
        let mut doc = Tour::schema().validate_create(payload()).unwrap();
        Tour::prepare(&mut doc);

        assert_eq!(doc["name"], "The Forest Hiker");
        assert_eq!(doc["slug"], "the-forest-hiker");
        assert_eq!(doc["duration"], 5);
        assert_eq!(doc["ratingsAverage"], 4.5);
        assert_eq!(doc["secretTour"], false);
        assert_eq!(doc["startLocation"]["type"], "Point");
        assert_eq!(doc["locations"][0]["type"], "Point");
        assert!(doc.contains_key("createdAt"));
    }

    #[test]
    fn test_discount_must_be_below_price() {
        let mut input = payload();
        input.insert("priceDiscount".into(), json!(500));
        let errors = Tour::schema().validate_create(input).unwrap_err();
        assert_eq!(
            errors.to_string(),
            "Discount price (500) should be below regular price"
        );
    }

    #[test]
    fn test_present_adds_duration_weeks() {
        let Value::Object(mut doc) = json!({"duration": 14}) else {
            unreachable!()
        };
        Tour::present(&mut doc);
        assert_eq!(doc["durationWeeks"], 2);
    }

    #[test]
    fn test_read_decorations_hide_created_at() {
        let hides_created_at = Tour::read_decorations().iter().any(|decoration| {
            matches!(decoration, QueryDecoration::HideFields(fields) if fields.contains(&"createdAt"))
        });
        assert!(hides_created_at);
    }
}

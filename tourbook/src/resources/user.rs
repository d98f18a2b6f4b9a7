//! Users

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::Resource;
use crate::query::QueryDecoration;
use crate::repository::Document;
use crate::schema::{Field, Schema};

/// Roles a user can hold
pub const ROLES: [&str; 4] = ["user", "guide", "lead-guide", "admin"];

/// Fields that only the password flows may write
pub const PASSWORD_FIELDS: [&str; 5] = [
    "password",
    "passwordConfirm",
    "passwordChangedAt",
    "passwordResetToken",
    "passwordResetExpires",
];

fn confirms_password(confirm: &Value, doc: &Document) -> bool {
    doc.get("password") == Some(confirm)
}

static SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(Field::string("name").required("Please tell us your name!").trim())
        .field(
            Field::string("email")
                .required("Please provide your email")
                .unique()
                .trim()
                .lowercase()
                .email("Please provide a valid email"),
        )
        .field(Field::string("photo").default_value(json!("default.jpg")))
        .field(
            Field::string("role")
                .default_value(json!("user"))
                .one_of(&ROLES, "Role is either: user, guide, lead-guide, admin"),
        )
        .field(
            Field::string("password")
                .required("Please provide a password")
                .min_length(8, "A password must have at least 8 characters")
                .hidden(),
        )
        .field(
            Field::string("passwordConfirm")
                .required("Please confirm your password")
                .check(confirms_password, "Passwords are not the same!")
                .hidden()
                .transient(),
        )
        .field(Field::date("passwordChangedAt"))
        .field(Field::string("passwordResetToken").hidden())
        .field(Field::date("passwordResetExpires").hidden())
        .field(Field::boolean("active").default_value(json!(true)).hidden())
});

/// The `users` resource
#[derive(Debug, Clone, Copy, Default)]
pub struct User;

impl Resource for User {
    const NAME: &'static str = "User";
    const COLLECTION: &'static str = "users";

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn decorations() -> Vec<QueryDecoration> {
        vec![QueryDecoration::hide_where("active", json!(false))]
    }

    // Passwords change only through the password endpoints, which hash them.
    fn prepare_update(changes: &mut Document) {
        for field in PASSWORD_FIELDS {
            changes.remove(field);
        }
    }
}

//! Declarative document validation
//!
//! Each resource declares a [`Schema`]: the fields it stores, how incoming
//! values are cast and normalized, and the constraints they must satisfy.
//! Validation is strict: fields the schema does not declare are dropped,
//! which also removes operator-shaped keys such as `$gt`.
//!
//! Two entry points mirror the two write paths:
//!
//! - [`Schema::validate_create`] checks a full payload, applies defaults and
//!   stamps the schema version (`__v`).
//! - [`Schema::validate_update`] checks only the supplied fields.
//!
//! String values are HTML-escaped (`<` and `>`) unless the field is hidden,
//! so secrets such as password hashes are stored byte-for-byte.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tourbook::schema::{Field, Schema};
//!
//! let schema = Schema::new()
//!     .field(Field::string("name").required("A tour must have a name").trim())
//!     .field(Field::number("price").required("A tour must have a price"));
//!
//! let input = json!({"name": "  The Forest Hiker ", "price": "397", "hack": true});
//! let doc = schema.validate_create(input.as_object().unwrap().clone()).unwrap();
//! assert_eq!(doc["name"], json!("The Forest Hiker"));
//! assert_eq!(doc["price"], json!(397));
//! assert!(!doc.contains_key("hack"));
//! ```

mod error;
mod field;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub use error::{FieldError, ValidationErrors};
pub use field::{CheckFn, DefaultValue, Field, FieldKind, Rule};

use crate::repository::Document;

/// Name of the schema-version field stamped on created documents
pub const VERSION_KEY: &str = "__v";

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Format a timestamp the way date fields are stored
pub fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored or submitted date
///
/// Accepts RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD,HH:MM` and `YYYY-MM-DDTHH:MM`.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d,%H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

/// JSON number from an `f64`, kept integral when possible
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('<', "&lt;").replace('>', "&gt;")
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

/// A resource's declared fields and indexes
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
    compound_indexes: Vec<Vec<&'static str>>,
}

impl Schema {
    /// An empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare a unique index over several fields
    #[must_use]
    pub fn unique_index(mut self, fields: &[&'static str]) -> Self {
        self.compound_indexes.push(fields.to_vec());
        self
    }

    /// Declared fields in order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fields never returned to callers
    pub fn hidden_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|field| field.hidden)
            .map(|field| field.name)
            .collect()
    }

    /// Every unique index, single-field ones first
    pub fn unique_indexes(&self) -> Vec<Vec<&'static str>> {
        self.fields
            .iter()
            .filter(|field| field.unique)
            .map(|field| vec![field.name])
            .chain(self.compound_indexes.iter().cloned())
            .collect()
    }

    /// Validate a complete payload for insertion
    pub fn validate_create(&self, input: Document) -> Result<Document, ValidationErrors> {
        let mut doc = validate_fields(&self.fields, &input, Mode::Create)?;
        doc.insert(VERSION_KEY.to_string(), Value::from(0));
        Ok(doc)
    }

    /// Validate a partial payload for an update
    ///
    /// Only supplied fields are checked; cross-field checks see the partial
    /// document.
    pub fn validate_update(&self, input: Document) -> Result<Document, ValidationErrors> {
        validate_fields(&self.fields, &input, Mode::Update)
    }
}

fn validate_fields(
    fields: &[Field],
    input: &Document,
    mode: Mode,
) -> Result<Document, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut doc = Document::new();

    for field in fields {
        match input.get(field.name) {
            Some(Value::Null) | None => {
                let supplied_null = input.contains_key(field.name);
                match mode {
                    Mode::Create => {
                        if let Some(default) = &field.default {
                            let value = match default {
                                DefaultValue::Value(value) => value.clone(),
                                DefaultValue::Now => Value::String(format_date(Utc::now())),
                            };
                            doc.insert(field.name.to_string(), value);
                        } else if let Some(message) = &field.required {
                            errors.add(field.name, "REQUIRED", message.clone());
                        }
                    }
                    Mode::Update if supplied_null => {
                        if let Some(message) = &field.required {
                            errors.add(field.name, "REQUIRED", message.clone());
                        } else {
                            doc.insert(field.name.to_string(), Value::Null);
                        }
                    }
                    Mode::Update => {}
                }
            }
            Some(raw) => match cast(field, &field.kind, raw, mode) {
                Ok(value) => {
                    doc.insert(field.name.to_string(), value);
                }
                Err(nested) => {
                    for error in nested.errors {
                        errors.errors.push(error);
                    }
                }
            },
        }
    }

    for field in fields {
        for rule in &field.rules {
            if let Rule::Check(check, message) = rule {
                if let Some(value) = doc.get(field.name).filter(|v| !v.is_null()) {
                    if !check(value, &doc) {
                        errors.add(
                            field.name,
                            "INVALID",
                            message.replace("{VALUE}", &describe(value)),
                        );
                    }
                }
            }
        }
    }

    for field in fields.iter().filter(|field| field.transient) {
        doc.remove(field.name);
    }

    if errors.is_empty() {
        Ok(doc)
    } else {
        Err(errors)
    }
}

fn cast_error(field: &Field, kind: &str, raw: &Value) -> ValidationErrors {
    ValidationErrors::single(
        field.name,
        "CAST",
        format!(
            "Cast to {} failed for value \"{}\" at path \"{}\"",
            kind,
            describe(raw),
            field.name
        ),
    )
}

fn cast(field: &Field, kind: &FieldKind, raw: &Value, mode: Mode) -> Result<Value, ValidationErrors> {
    let value = match kind {
        FieldKind::String => {
            let text = match raw {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(cast_error(field, "string", raw)),
            };
            let text = if field.trim { text.trim().to_string() } else { text };
            let text = if field.lowercase { text.to_lowercase() } else { text };
            let text = if field.hidden { text } else { escape_html(&text) };
            Value::String(text)
        }
        FieldKind::Number => {
            let n = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
                _ => None,
            }
            .ok_or_else(|| cast_error(field, "Number", raw))?;
            let n = match field.round {
                Some(decimals) => {
                    let factor = 10f64.powi(decimals as i32);
                    (n * factor).round() / factor
                }
                None => n,
            };
            number_value(n)
        }
        FieldKind::Boolean => match raw {
            Value::Bool(b) => Value::Bool(*b),
            Value::String(s) if s == "true" => Value::Bool(true),
            Value::String(s) if s == "false" => Value::Bool(false),
            _ => return Err(cast_error(field, "Boolean", raw)),
        },
        FieldKind::Date => {
            let parsed = match raw {
                Value::String(s) => parse_date(s),
                Value::Number(n) => n
                    .as_i64()
                    .and_then(DateTime::<Utc>::from_timestamp_millis),
                _ => None,
            }
            .ok_or_else(|| cast_error(field, "date", raw))?;
            Value::String(format_date(parsed))
        }
        FieldKind::Id => match raw {
            Value::String(s) if !s.trim().is_empty() => Value::String(s.trim().to_string()),
            _ => return Err(cast_error(field, "ObjectId", raw)),
        },
        FieldKind::Any => raw.clone(),
        FieldKind::Array(item) => {
            let items = match raw {
                Value::Array(items) => items.clone(),
                single => vec![single.clone()],
            };
            let mut cast_items = Vec::with_capacity(items.len());
            let mut errors = ValidationErrors::new();
            for item_value in &items {
                match cast(field, item, item_value, mode) {
                    Ok(value) => cast_items.push(value),
                    Err(nested) => errors.errors.extend(nested.errors),
                }
            }
            if !errors.is_empty() {
                return Err(errors);
            }
            return Ok(Value::Array(cast_items));
        }
        FieldKind::Object(fields) => {
            let Value::Object(map) = raw else {
                return Err(cast_error(field, "Embedded", raw));
            };
            // Embedded documents are always complete, so defaults apply on update too.
            return match validate_fields(fields, map, Mode::Create) {
                Ok(doc) => Ok(Value::Object(doc)),
                Err(nested) => {
                    let mut errors = ValidationErrors::new();
                    errors.extend_nested(field.name, nested);
                    Err(errors)
                }
            };
        }
    };

    let mut errors = ValidationErrors::new();
    for rule in &field.rules {
        let violated = match (rule, &value) {
            (Rule::MinLength(min, _), Value::String(s)) => s.chars().count() < *min,
            (Rule::MaxLength(max, _), Value::String(s)) => s.chars().count() > *max,
            (Rule::Min(min, _), Value::Number(n)) => n.as_f64().is_some_and(|n| n < *min),
            (Rule::Max(max, _), Value::Number(n)) => n.as_f64().is_some_and(|n| n > *max),
            (Rule::OneOf(allowed, _), Value::String(s)) => !allowed.contains(&s.as_str()),
            (Rule::Email(_), Value::String(s)) => !EMAIL.is_match(s),
            _ => false,
        };
        if violated {
            let (code, message) = match rule {
                Rule::MinLength(_, m) => ("TOO_SHORT", m),
                Rule::MaxLength(_, m) => ("TOO_LONG", m),
                Rule::Min(_, m) => ("MIN", m),
                Rule::Max(_, m) => ("MAX", m),
                Rule::OneOf(_, m) => ("ENUM", m),
                Rule::Email(m) => ("INVALID_FORMAT", m),
                Rule::Check(_, m) => ("INVALID", m),
            };
            errors.add(field.name, code, message.replace("{VALUE}", &describe(&value)));
        }
    }

    if errors.is_empty() {
        Ok(value)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn priced() -> Schema {
        Schema::new()
            .field(
                Field::string("name")
                    .required("A tour must have a name")
                    .trim()
                    .max_length(10, "name too long")
                    .unique(),
            )
            .field(Field::number("price").required("A tour must have a price"))
            .field(Field::number("priceDiscount").check(
                |discount, doc| match (discount.as_f64(), doc.get("price").and_then(Value::as_f64)) {
                    (Some(discount), Some(price)) => discount < price,
                    _ => true,
                },
                "Discount price ({VALUE}) should be below regular price",
            ))
            .field(
                Field::number("ratingsAverage")
                    .default_value(json!(4.5))
                    .min(1.0, "Rating must be above 1.0")
                    .max(5.0, "Rating must be below 5.0")
                    .round(1),
            )
            .field(
                Field::string("difficulty")
                    .one_of(&["easy", "medium", "difficult"], "Difficulty is either: easy, medium, difficult"),
            )
            .field(Field::date("createdAt").default_now().hidden())
            .field(Field::string("secret").hidden())
    }

    #[test]
    fn test_create_reports_every_missing_required_field() {
        let err = priced().validate_create(Document::new()).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(err.has_field("name"));
        assert!(err.has_field("price"));
        assert_eq!(err.to_string(), "A tour must have a name. A tour must have a price");
    }

    #[test]
    fn test_create_applies_defaults_and_version() {
        let created = priced()
            .validate_create(doc(json!({"name": "Hiker", "price": 10})))
            .unwrap();
        assert_eq!(created["ratingsAverage"], json!(4.5));
        assert_eq!(created[VERSION_KEY], json!(0));
        assert!(parse_date(created["createdAt"].as_str().unwrap()).is_some());
    }

    #[test]
    fn test_unknown_and_operator_keys_are_dropped() {
        let created = priced()
            .validate_create(doc(json!({"name": "Hiker", "price": 10, "$where": "1", "role": "admin"})))
            .unwrap();
        assert!(!created.contains_key("$where"));
        assert!(!created.contains_key("role"));
    }

    #[test]
    fn test_rules_and_rounding() {
        let err = priced()
            .validate_create(doc(json!({
                "name": "Far too long a name",
                "price": 10,
                "ratingsAverage": 7,
                "difficulty": "extreme"
            })))
            .unwrap_err();
        let codes: Vec<_> = err.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["TOO_LONG", "MAX", "ENUM"]);

        let ok = priced()
            .validate_create(doc(json!({"name": "Hiker", "price": 10, "ratingsAverage": 4.66666})))
            .unwrap();
        assert_eq!(ok["ratingsAverage"], json!(4.7));
    }

    #[test]
    fn test_cross_field_check_interpolates_value() {
        let err = priced()
            .validate_create(doc(json!({"name": "Hiker", "price": 10, "priceDiscount": 20})))
            .unwrap_err();
        assert_eq!(
            err.errors[0].message,
            "Discount price (20) should be below regular price"
        );

        // Without a price in the partial update there is nothing to compare against.
        assert!(priced()
            .validate_update(doc(json!({"priceDiscount": 20})))
            .is_ok());
    }

    #[test]
    fn test_cast_failures() {
        let err = priced()
            .validate_create(doc(json!({"name": "Hiker", "price": "cheap"})))
            .unwrap_err();
        assert_eq!(err.errors[0].code, "CAST");
        assert_eq!(
            err.errors[0].message,
            "Cast to Number failed for value \"cheap\" at path \"price\""
        );
    }

    #[test]
    fn test_update_checks_only_supplied_fields() {
        let updated = priced()
            .validate_update(doc(json!({"price": "99"})))
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated["price"], json!(99));

        let err = priced()
            .validate_update(doc(json!({"name": null})))
            .unwrap_err();
        assert_eq!(err.errors[0].code, "REQUIRED");
    }

    #[test]
    fn test_strings_are_escaped_except_hidden() {
        let created = priced()
            .validate_create(doc(json!({"name": "<b>Hi</b>", "price": 1, "secret": "<x>"})))
            .unwrap_err();
        // The escaped name exceeds ten characters.
        assert!(created.has_field("name"));

        let created = priced()
            .validate_create(doc(json!({"name": "<i>", "price": 1, "secret": "<x>"})))
            .unwrap();
        assert_eq!(created["name"], json!("&lt;i&gt;"));
        assert_eq!(created["secret"], json!("<x>"));
    }

    #[test]
    fn test_embedded_and_array_fields() {
        let schema = Schema::new()
            .field(Field::array("startDates", FieldKind::Date))
            .field(Field::object(
                "startLocation",
                vec![
                    Field::string("type").default_value(json!("Point")).one_of(&["Point"], "Only points"),
                    Field::array("coordinates", FieldKind::Number),
                ],
            ));

        let created = schema
            .validate_create(doc(json!({
                "startDates": ["2021-06-19,10:00", "2021-07-20"],
                "startLocation": {"coordinates": [-80.18, 25.77]}
            })))
            .unwrap();
        assert_eq!(
            created["startDates"],
            json!(["2021-06-19T10:00:00.000Z", "2021-07-20T00:00:00.000Z"])
        );
        assert_eq!(created["startLocation"]["type"], json!("Point"));

        let err = schema
            .validate_create(doc(json!({"startLocation": {"type": "Polygon"}})))
            .unwrap_err();
        assert_eq!(err.errors[0].field, "startLocation.type");
    }

    #[test]
    fn test_hidden_and_unique_metadata() {
        let schema = priced().unique_index(&["name", "price"]);
        assert_eq!(schema.hidden_fields(), vec!["createdAt", "secret"]);
        assert_eq!(
            schema.unique_indexes(),
            vec![vec!["name"], vec!["name", "price"]]
        );
    }

    #[test]
    fn test_transient_fields_are_validated_then_removed() {
        let schema = Schema::new()
            .field(Field::string("password").required("Please provide a password").hidden())
            .field(
                Field::string("passwordConfirm")
                    .required("Please confirm your password")
                    .transient()
                    .check(
                        |confirm, doc| doc.get("password") == Some(confirm),
                        "Passwords are not the same!",
                    ),
            );

        let err = schema
            .validate_create(doc(json!({"password": "pass1234", "passwordConfirm": "nope"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Passwords are not the same!");

        let ok = schema
            .validate_create(doc(json!({"password": "pass1234", "passwordConfirm": "pass1234"})))
            .unwrap();
        assert!(!ok.contains_key("passwordConfirm"));
    }
}

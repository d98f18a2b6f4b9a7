//! Field declarations
//!
//! A [`Field`] describes one top-level or embedded property: its kind, how
//! incoming values are normalized and which [`Rule`]s they must satisfy.
//! Fields are built with chained methods:
//!
//! ```rust
//! use tourbook::schema::Field;
//!
//! let name = Field::string("name")
//!     .required("A tour must have a name")
//!     .unique()
//!     .trim()
//!     .max_length(40, "A tour name must have less or equal then 40 characters");
//! assert!(name.is_unique());
//! ```

use std::fmt;

use serde_json::Value;

use super::Document;

/// Storage kind of a field
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// UTF-8 text
    String,
    /// Integer or floating point number
    Number,
    /// `true` or `false`
    Boolean,
    /// Point in time, stored as an RFC 3339 UTC string
    Date,
    /// Id of a document in another collection
    Id,
    /// Any JSON value, stored untouched
    Any,
    /// Homogeneous array
    Array(Box<FieldKind>),
    /// Embedded document with its own fields
    Object(Vec<Field>),
}

/// Value assigned on create when the field is absent
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// A fixed value
    Value(Value),
    /// The current time
    Now,
}

/// Cross-field predicate: the field's value and the candidate document
pub type CheckFn = fn(&Value, &Document) -> bool;

/// A constraint on a field's value
///
/// Messages may contain `{VALUE}`, replaced with the offending value.
#[derive(Clone)]
pub enum Rule {
    /// Minimum string length in characters
    MinLength(usize, String),
    /// Maximum string length in characters
    MaxLength(usize, String),
    /// Minimum numeric value
    Min(f64, String),
    /// Maximum numeric value
    Max(f64, String),
    /// String must be one of the listed values
    OneOf(Vec<&'static str>, String),
    /// String must look like an email address
    Email(String),
    /// Predicate over the value and the whole candidate document
    Check(CheckFn, String),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinLength(n, _) => write!(f, "MinLength({})", n),
            Self::MaxLength(n, _) => write!(f, "MaxLength({})", n),
            Self::Min(n, _) => write!(f, "Min({})", n),
            Self::Max(n, _) => write!(f, "Max({})", n),
            Self::OneOf(values, _) => write!(f, "OneOf({:?})", values),
            Self::Email(_) => write!(f, "Email"),
            Self::Check(_, message) => write!(f, "Check({:?})", message),
        }
    }
}

/// A declared field
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: &'static str,
    pub(crate) kind: FieldKind,
    pub(crate) required: Option<String>,
    pub(crate) trim: bool,
    pub(crate) lowercase: bool,
    pub(crate) hidden: bool,
    pub(crate) unique: bool,
    pub(crate) transient: bool,
    pub(crate) round: Option<u32>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) rules: Vec<Rule>,
}

impl Field {
    /// Declare a field of any kind
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: None,
            trim: false,
            lowercase: false,
            hidden: false,
            unique: false,
            transient: false,
            round: None,
            default: None,
            rules: Vec::new(),
        }
    }

    /// A string field
    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// A number field
    pub fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    /// A boolean field
    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// A date field
    pub fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    /// A reference to another document's `_id`
    pub fn reference(name: &'static str) -> Self {
        Self::new(name, FieldKind::Id)
    }

    /// An array of `item`
    pub fn array(name: &'static str, item: FieldKind) -> Self {
        Self::new(name, FieldKind::Array(Box::new(item)))
    }

    /// An embedded document
    pub fn object(name: &'static str, fields: Vec<Field>) -> Self {
        Self::new(name, FieldKind::Object(fields))
    }

    /// Field name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a unique index covers this field alone
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether the field is never returned to callers
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Reject payloads without this field
    #[must_use]
    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    /// Strip surrounding whitespace from strings
    #[must_use]
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Lowercase strings
    #[must_use]
    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// Exclude from every projection
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Declare a single-field unique index
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Validate but never store
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Round numbers to `decimals` places
    #[must_use]
    pub fn round(mut self, decimals: u32) -> Self {
        self.round = Some(decimals);
        self
    }

    /// Value assigned on create when absent
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    /// Current time assigned on create when absent
    #[must_use]
    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::Now);
        self
    }

    /// Minimum length in characters
    #[must_use]
    pub fn min_length(mut self, min: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MinLength(min, message.into()));
        self
    }

    /// Maximum length in characters
    #[must_use]
    pub fn max_length(mut self, max: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MaxLength(max, message.into()));
        self
    }

    /// Minimum numeric value
    #[must_use]
    pub fn min(mut self, min: f64, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Min(min, message.into()));
        self
    }

    /// Maximum numeric value
    #[must_use]
    pub fn max(mut self, max: f64, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Max(max, message.into()));
        self
    }

    /// Restrict to an enumeration of strings
    #[must_use]
    pub fn one_of(mut self, values: &[&'static str], message: impl Into<String>) -> Self {
        self.rules.push(Rule::OneOf(values.to_vec(), message.into()));
        self
    }

    /// Require an email-shaped string
    #[must_use]
    pub fn email(mut self, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Email(message.into()));
        self
    }

    /// Require a predicate over the value and the candidate document
    #[must_use]
    pub fn check(mut self, check: CheckFn, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Check(check, message.into()));
        self
    }
}

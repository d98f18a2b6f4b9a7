//! Validation error collection

use std::fmt;

use serde::Serialize;

/// A single field-level validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name (dotted for embedded documents)
    pub field: String,
    /// Error code (e.g., "REQUIRED", "CAST", "TOO_LONG")
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
}

/// Every constraint a payload violated
///
/// Displays as the messages joined with `". "`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// Field errors in schema order
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection holding one error
    pub fn single(field: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, code, message);
        errors
    }

    /// Record a field error
    pub fn add(&mut self, field: impl Into<String>, code: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            code,
            message: message.into(),
        });
    }

    /// Absorb errors from an embedded document, prefixing field names
    pub fn extend_nested(&mut self, prefix: &str, nested: ValidationErrors) {
        for error in nested.errors {
            self.errors.push(FieldError {
                field: format!("{}.{}", prefix, error.field),
                ..error
            });
        }
    }

    /// True when no error was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check whether a specific field failed
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join(". "))
    }
}

impl std::error::Error for ValidationErrors {}

//! Field validation for a section's visible fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{FieldKind, SectionSchema, SectionValues, ValidationRule};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Why a field failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldErrorKind {
    Required,
    TooLong { max: usize },
    InvalidEmail,
    UnknownOption,
}

/// A validation failure on a single field, surfaced inline next to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    #[serde(flatten)]
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FieldErrorKind::Required => write!(f, "{}: this is a required field", self.field),
            FieldErrorKind::TooLong { max } => {
                write!(f, "{}: must be at most {} characters", self.field, max)
            }
            FieldErrorKind::InvalidEmail => {
                write!(f, "{}: this is not a valid email address", self.field)
            }
            FieldErrorKind::UnknownOption => write!(f, "{}: not one of the options", self.field),
        }
    }
}

/// Validate the visible fields of a section. Hidden fields are skipped since
/// the customer cannot fix them.
pub fn validate_section(schema: &SectionSchema, values: &SectionValues) -> Vec<FieldError> {
    let mut errors = Vec::new();

    for field in schema.visible_fields(values) {
        let value = values.get(&field.id).cloned().unwrap_or_default();
        let error = |kind| FieldError {
            field: field.id.clone(),
            kind,
        };

        if value.is_empty() {
            if field.required {
                errors.push(error(FieldErrorKind::Required));
            }
            continue;
        }

        let Some(text) = value.as_text() else {
            continue;
        };

        if let Some(max) = field.max_length {
            if text.chars().count() > max {
                errors.push(error(FieldErrorKind::TooLong { max }));
            }
        }

        if field.validation == Some(ValidationRule::Email) && !EMAIL_RE.is_match(text) {
            errors.push(error(FieldErrorKind::InvalidEmail));
        }

        if let FieldKind::Select { options } = &field.kind {
            if !options.iter().any(|o| o.value == text) {
                errors.push(error(FieldErrorKind::UnknownOption));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BuiltinSchemaProvider, FieldSchemaProvider, FieldValue, Settings};

    fn values(pairs: &[(&str, FieldValue)]) -> SectionValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_required_email() {
        let schema = BuiltinSchemaProvider::new().resolve("contact", &Settings::default());
        let errors = validate_section(&schema, &SectionValues::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, FieldErrorKind::Required);
    }

    #[test]
    fn test_invalid_email() {
        let schema = BuiltinSchemaProvider::new().resolve("contact", &Settings::default());
        let errors = validate_section(&schema, &values(&[("email", "not-an-email".into())]));
        assert_eq!(errors[0].kind, FieldErrorKind::InvalidEmail);

        let errors = validate_section(&schema, &values(&[("email", "a@b.co".into())]));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_max_length_counts_chars() {
        let mut settings = Settings::default();
        settings.gift_options.enabled = true;
        settings.gift_options.message_max_length = Some(5);
        let schema = BuiltinSchemaProvider::new().resolve("gift_options", &settings);

        let ok = validate_section(&schema, &values(&[("gift_message", "héllo".into())]));
        assert!(ok.is_empty());

        let errors = validate_section(&schema, &values(&[("gift_message", "héllo!".into())]));
        assert_eq!(errors[0].kind, FieldErrorKind::TooLong { max: 5 });
    }

    #[test]
    fn test_hidden_billing_fields_not_validated() {
        let schema = BuiltinSchemaProvider::new().resolve("billing", &Settings::default());
        let errors = validate_section(&schema, &schema.defaults());
        assert!(errors.is_empty());

        let errors = validate_section(
            &schema,
            &values(&[("same_as_shipping", FieldValue::Bool(false))]),
        );
        assert!(errors
            .iter()
            .any(|e| e.field == "billing_first_name" && e.kind == FieldErrorKind::Required));
    }

    #[test]
    fn test_unknown_select_option() {
        let schema = BuiltinSchemaProvider::new().resolve("shipping", &Settings::default());
        let mut vals = schema.defaults();
        vals.insert("country".to_string(), "XX".into());
        let errors = validate_section(&schema, &vals);
        assert!(errors
            .iter()
            .any(|e| e.field == "country" && e.kind == FieldErrorKind::UnknownOption));
    }
}

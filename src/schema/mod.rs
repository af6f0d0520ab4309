//! Field and section definitions for checkout substeps.
//!
//! A [`SectionSchema`] is the resolved, settings-dependent list of fields for
//! one section key. Schemas are produced by a [`FieldSchemaProvider`] and are
//! immutable for the duration of a request.

pub mod provider;
pub mod settings;
pub mod validate;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use provider::{BuiltinSchemaProvider, CartContext, FieldSchemaProvider};
pub use settings::{CheckoutLayout, PhoneVisibility, Settings};
pub use validate::{validate_section, FieldError, FieldErrorKind};

/// Section keys understood by the built-in provider
pub mod sections {
    pub const CONTACT: &str = "contact";
    pub const SHIPPING: &str = "shipping";
    pub const BILLING: &str = "billing";
    pub const GIFT_OPTIONS: &str = "gift_options";
    pub const ORDER_NOTES: &str = "order_notes";

    /// Display order of the built-in sections
    pub const ALL: &[&str] = &[CONTACT, SHIPPING, BILLING, GIFT_OPTIONS, ORDER_NOTES];
}

/// Values of one section keyed by field id
pub type SectionValues = BTreeMap<String, FieldValue>;

/// A single field value as stored in the session or on the order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
    #[default]
    Null,
}

impl FieldValue {
    /// Convenience constructor for text values
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Empty values are never persisted on an order and never summarized
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(checked) => !checked,
            FieldValue::Text(s) => s.is_empty(),
        }
    }

    /// Whether the value counts as a checked checkbox
    pub fn is_checked(&self) -> bool {
        match self {
            FieldValue::Bool(checked) => *checked,
            FieldValue::Text(s) => matches!(s.as_str(), "1" | "yes" | "true" | "on"),
            FieldValue::Null => false,
        }
    }

    /// Text representation, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// An option of a select field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Kinds of fields a section can contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    /// Single-line text input
    Text,
    /// Multi-line text input
    Textarea,
    /// Selection from predefined options
    Select { options: Vec<SelectOption> },
    /// True/false checkbox
    Checkbox,
    /// Value carried with the form but never shown
    Hidden,
}

impl FieldKind {
    /// Value a field of this kind holds when nothing was entered
    pub fn empty_value(&self) -> FieldValue {
        match self {
            FieldKind::Checkbox => FieldValue::Bool(false),
            FieldKind::Text | FieldKind::Textarea | FieldKind::Select { .. } | FieldKind::Hidden => {
                FieldValue::Null
            }
        }
    }

    /// Coerce a submitted value into the shape this kind stores.
    ///
    /// Coercion is idempotent: coercing an already coerced value is a no-op.
    pub fn coerce(&self, value: FieldValue) -> FieldValue {
        match self {
            FieldKind::Checkbox => FieldValue::Bool(value.is_checked()),
            FieldKind::Text | FieldKind::Textarea | FieldKind::Select { .. } | FieldKind::Hidden => {
                match value {
                    FieldValue::Text(s) => FieldValue::Text(s.trim().to_string()),
                    FieldValue::Bool(true) => FieldValue::Text("1".to_string()),
                    FieldValue::Bool(false) | FieldValue::Null => FieldValue::Null,
                }
            }
        }
    }

    /// Short name used by render templates and DTOs
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Select { .. } => "select",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Hidden => "hidden",
        }
    }
}

/// When a field is shown, evaluated against the section's current values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "when", content = "field", rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Always,
    /// Shown only while the named checkbox is checked
    WhenChecked(String),
    /// Shown only while the named checkbox is unchecked
    WhenUnchecked(String),
    /// Shown only once the named field has a value
    WhenFilled(String),
}

/// Extra validation applied on top of required/max length/options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationRule {
    Email,
}

/// How a field shows up in the collapsed summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    /// The value on its own line
    #[default]
    Value,
    /// "Label: value"
    Labeled,
    /// The field label, only when the checkbox is checked
    LabelWhenChecked,
    /// Never part of the summary
    Omit,
}

/// A single field of a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field identifier, unique within its section
    pub id: String,
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub default: Option<FieldValue>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
    #[serde(default)]
    pub summary_style: SummaryStyle,
    /// Field that must be non-empty for this one to be kept on the order
    #[serde(default)]
    pub paired_with: Option<String>,
    /// Optional field rendered behind an "add" link until it has a value
    #[serde(default)]
    pub collapsible: bool,
}

impl FieldDefinition {
    /// Create an optional field with no default
    pub fn new(id: impl Into<String>, kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            placeholder: None,
            default: None,
            max_length: None,
            required: false,
            visibility: Visibility::Always,
            validation: None,
            summary_style: SummaryStyle::Value,
            paired_with: None,
            collapsible: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: FieldValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_validation(mut self, rule: ValidationRule) -> Self {
        self.validation = Some(rule);
        self
    }

    pub fn with_summary_style(mut self, style: SummaryStyle) -> Self {
        self.summary_style = style;
        self
    }

    pub fn paired_with(mut self, field_id: impl Into<String>) -> Self {
        self.paired_with = Some(field_id.into());
        self
    }

    /// Value stored when the customer never touched the field
    pub fn default_value(&self) -> FieldValue {
        self.default
            .clone()
            .map(|v| self.kind.coerce(v))
            .unwrap_or_else(|| self.kind.empty_value())
    }

    /// Display label of a select value, falling back to the raw value
    pub fn option_label<'a>(&'a self, value: &'a str) -> &'a str {
        match &self.kind {
            FieldKind::Select { options } => options
                .iter()
                .find(|o| o.value == value)
                .map(|o| o.label.as_str())
                .unwrap_or(value),
            _ => value,
        }
    }
}

/// Whether a field is shown given the section's current values
pub fn is_visible(field: &FieldDefinition, values: &SectionValues) -> bool {
    if field.kind == FieldKind::Hidden {
        return false;
    }
    let lookup = |id: &str| values.get(id).cloned().unwrap_or_default();
    match &field.visibility {
        Visibility::Always => true,
        Visibility::WhenChecked(id) => lookup(id).is_checked(),
        Visibility::WhenUnchecked(id) => !lookup(id).is_checked(),
        Visibility::WhenFilled(id) => !lookup(id).is_empty(),
    }
}

/// Ordered field list for one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSchema {
    pub key: String,
    pub title: String,
    pub fields: Vec<FieldDefinition>,
}

impl SectionSchema {
    /// Schema with no fields; what unknown or disabled sections resolve to
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Fields shown for the given values, in display order
    pub fn visible_fields<'a>(
        &'a self,
        values: &'a SectionValues,
    ) -> impl Iterator<Item = &'a FieldDefinition> + 'a {
        self.fields.iter().filter(move |f| is_visible(f, values))
    }

    /// Complete value map holding each field's default
    pub fn defaults(&self) -> SectionValues {
        self.fields
            .iter()
            .map(|f| (f.id.clone(), f.default_value()))
            .collect()
    }

    /// Check that field ids are unique; returns the first duplicate
    pub fn duplicate_field(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.fields
            .iter()
            .map(|f| f.id.as_str())
            .find(|id| !seen.insert(*id))
    }
}

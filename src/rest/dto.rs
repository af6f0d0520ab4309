//! Data Transfer Objects for the REST API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::order::{CommitReport, SectionCommit};
use crate::schema::{FieldDefinition, FieldError, SectionSchema, SectionValues, Visibility};
use crate::summary::{DetailRow, Summary};

// =============================================================================
// Health DTOs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Schema DTOs
// =============================================================================

/// An option of a select field
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OptionResponse {
    pub value: String,
    pub label: String,
}

/// A field of a resolved section schema
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FieldResponse {
    pub id: String,
    /// text, textarea, select, checkbox or hidden
    pub kind: String,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[schema(value_type = Object)]
    pub default: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionResponse>,
    /// e.g. "always", "when_unchecked:same_as_shipping"
    pub visibility: String,
    pub collapsible: bool,
}

impl From<&FieldDefinition> for FieldResponse {
    fn from(field: &FieldDefinition) -> Self {
        let options = match &field.kind {
            crate::schema::FieldKind::Select { options } => options
                .iter()
                .map(|o| OptionResponse {
                    value: o.value.clone(),
                    label: o.label.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        let visibility = match &field.visibility {
            Visibility::Always => "always".to_string(),
            Visibility::WhenChecked(id) => format!("when_checked:{}", id),
            Visibility::WhenUnchecked(id) => format!("when_unchecked:{}", id),
            Visibility::WhenFilled(id) => format!("when_filled:{}", id),
        };

        Self {
            id: field.id.clone(),
            kind: field.kind.name().to_string(),
            label: field.label.clone(),
            required: field.required,
            max_length: field.max_length,
            placeholder: field.placeholder.clone(),
            default: serde_json::to_value(field.default_value()).unwrap_or_default(),
            options,
            visibility,
            collapsible: field.collapsible,
        }
    }
}

/// Resolved schema of a section; empty when the section is disabled or unknown
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SchemaResponse {
    pub section: String,
    pub title: String,
    pub fields: Vec<FieldResponse>,
}

impl From<&SectionSchema> for SchemaResponse {
    fn from(schema: &SectionSchema) -> Self {
        Self {
            section: schema.key.clone(),
            title: schema.title.clone(),
            fields: schema.fields.iter().map(FieldResponse::from).collect(),
        }
    }
}

// =============================================================================
// Session DTOs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Query parameters describing the cart
#[derive(Debug, Default, Deserialize)]
pub struct CartQuery {
    /// False for carts with only virtual products (default true)
    #[serde(default)]
    pub needs_shipping: Option<bool>,
}

/// Submitted values of a section
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateSectionRequest {
    /// Field id to value (string, bool or null)
    #[schema(value_type = Object)]
    pub values: SectionValues,
    /// Advance to review (true) or only autosave (false)
    #[serde(default = "default_advance")]
    pub advance: bool,
}

fn default_advance() -> bool {
    true
}

/// Inline error next to a field
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FieldErrorResponse {
    pub field: String,
    pub message: String,
}

impl From<&FieldError> for FieldErrorResponse {
    fn from(err: &FieldError) -> Self {
        Self {
            field: err.field.clone(),
            message: err.to_string(),
        }
    }
}

/// A section as the customer currently sees it
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SectionResponse {
    pub section: String,
    /// hidden, editing or review
    pub state: String,
    #[schema(value_type = Object)]
    pub values: SectionValues,
    /// Summary lines; empty while hidden
    pub summary: Vec<String>,
    pub errors: Vec<FieldErrorResponse>,
    /// Rendered markup; empty while hidden
    pub html: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FragmentsResponse {
    /// CSS selector to summary markup
    pub fragments: BTreeMap<String, String>,
}

// =============================================================================
// Order DTOs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommitRequest {
    pub session_id: String,
    /// Sections to commit; all built-in sections when omitted
    #[serde(default)]
    pub sections: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SectionCommitResponse {
    pub section: String,
    pub written: Vec<String>,
    pub deleted: Vec<String>,
    pub attempts: usize,
}

impl From<&SectionCommit> for SectionCommitResponse {
    fn from(commit: &SectionCommit) -> Self {
        Self {
            section: commit.section.clone(),
            written: commit.written.clone(),
            deleted: commit.deleted.clone(),
            attempts: commit.attempts,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommitResponse {
    pub order_id: String,
    pub sections: Vec<SectionCommitResponse>,
    pub skipped: Vec<String>,
    /// Committed sections still present in the session
    pub uncleared: Vec<String>,
}

impl From<&CommitReport> for CommitResponse {
    fn from(report: &CommitReport) -> Self {
        Self {
            order_id: report.order_id.clone(),
            sections: report.sections.iter().map(SectionCommitResponse::from).collect(),
            skipped: report.skipped.clone(),
            uncleared: report.uncleared.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderSummaryResponse {
    pub order_id: String,
    pub section: String,
    pub lines: Vec<String>,
    pub html: String,
}

impl OrderSummaryResponse {
    pub fn new(order_id: &str, summary: &Summary, html: String) -> Self {
        Self {
            order_id: order_id.to_string(),
            section: summary.section.clone(),
            lines: summary_lines(summary),
            html,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailRowResponse {
    pub label: String,
    pub value: String,
}

impl From<&DetailRow> for DetailRowResponse {
    fn from(row: &DetailRow) -> Self {
        Self {
            label: row.label.clone(),
            value: row.value.clone(),
        }
    }
}

/// Gift details for order pages
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailsResponse {
    pub order_id: String,
    pub rows: Vec<DetailRowResponse>,
    /// Lines of the separate gift block, when rows are not used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift_section: Option<Vec<String>>,
}

pub fn summary_lines(summary: &Summary) -> Vec<String> {
    summary.lines.iter().map(|l| l.text.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BuiltinSchemaProvider, FieldSchemaProvider, Settings};

    #[test]
    fn test_schema_response_describes_fields() {
        let schema = BuiltinSchemaProvider::new().resolve("billing", &Settings::default());
        let resp = SchemaResponse::from(&schema);

        assert_eq!(resp.fields[0].id, "same_as_shipping");
        assert_eq!(resp.fields[0].kind, "checkbox");
        assert_eq!(resp.fields[0].default, serde_json::json!(true));
        assert_eq!(resp.fields[1].visibility, "when_unchecked:same_as_shipping");
        let country = resp.fields.iter().find(|f| f.id == "billing_country").unwrap();
        assert_eq!(country.options.len(), 3);
    }

    #[test]
    fn test_update_request_defaults_to_advance() {
        let req: UpdateSectionRequest =
            serde_json::from_str(r#"{"values": {"gift_message": "Hi", "gift_from": null}}"#)
                .unwrap();
        assert!(req.advance);
        assert_eq!(req.values.len(), 2);
    }
}

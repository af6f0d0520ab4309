//! Presentation of sections.
//!
//! The core hands a [`SectionView`] to a [`RenderSink`] and never reads the
//! output back. [`HtmlRenderSink`] renders checkout markup with handlebars;
//! [`RecordingRenderSink`] keeps the views for inspection.

mod html;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::order::OrderRecord;
use crate::schema::{
    is_visible, CartContext, FieldDefinition, FieldError, FieldKind, FieldSchemaProvider,
    FieldValue, SectionSchema, SectionValues, Settings,
};
use crate::substeps::SubstepState;
use crate::summary::{Summary, SummaryRenderer, ValueSource};

pub use html::{HtmlRenderSink, HtmlRenderer};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to register template '{name}': {source}")]
    Template {
        name: &'static str,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("failed to render section '{section}': {source}")]
    Render {
        section: String,
        #[source]
        source: handlebars::RenderError,
    },
}

/// Write-only target for rendered sections
pub trait RenderSink: Send {
    fn write(&mut self, view: &SectionView) -> Result<(), RenderError>;
}

/// An option of a select field as presented
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// One form field as presented
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub id: String,
    pub kind: &'static str,
    #[serde(skip)]
    pub template: &'static str,
    pub label: String,
    pub value: String,
    pub checked: bool,
    pub placeholder: Option<String>,
    pub max_length: Option<usize>,
    pub required: bool,
    /// Rendered behind an "add" toggle until it has a value
    pub collapsed: bool,
    pub options: Vec<OptionView>,
    pub errors: Vec<String>,
}

impl FieldView {
    pub fn new(field: &FieldDefinition, value: &FieldValue, errors: &[FieldError]) -> Self {
        let options = match &field.kind {
            FieldKind::Select { options } => options
                .iter()
                .map(|o| OptionView {
                    value: o.value.clone(),
                    label: o.label.clone(),
                    selected: value.as_text() == Some(o.value.as_str()),
                })
                .collect(),
            FieldKind::Text | FieldKind::Textarea | FieldKind::Checkbox | FieldKind::Hidden => {
                Vec::new()
            }
        };

        Self {
            id: field.id.clone(),
            kind: field.kind.name(),
            template: html::template_for(&field.kind),
            label: field.label.clone(),
            value: value.to_string(),
            checked: value.is_checked(),
            placeholder: field.placeholder.clone(),
            max_length: field.max_length,
            required: field.required,
            collapsed: field.collapsible && value.is_empty(),
            options,
            errors: errors
                .iter()
                .filter(|e| e.field == field.id)
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// What a section shows in its current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewBody {
    Form { fields: Vec<FieldView> },
    Summary { summary: Summary },
}

/// Everything a sink needs to present one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionView {
    pub section: String,
    pub title: String,
    pub state: SubstepState,
    /// Whether an "edit" link is offered
    pub editable: bool,
    #[serde(flatten)]
    pub body: ViewBody,
}

impl SectionView {
    /// Live form of the fields visible for `values`
    pub fn form(schema: &SectionSchema, values: &SectionValues, errors: &[FieldError]) -> Self {
        let fields = schema
            .fields
            .iter()
            .filter(|f| f.kind == FieldKind::Hidden || is_visible(f, values))
            .map(|f| {
                let value = values.get(&f.id).cloned().unwrap_or_default();
                FieldView::new(f, &value, errors)
            })
            .collect();

        Self {
            section: schema.key.clone(),
            title: schema.title.clone(),
            state: SubstepState::Editing,
            editable: false,
            body: ViewBody::Form { fields },
        }
    }

    /// Collapsed summary of a section
    pub fn summary(schema: &SectionSchema, summary: Summary, editable: bool) -> Self {
        Self {
            section: schema.key.clone(),
            title: schema.title.clone(),
            state: SubstepState::Review,
            editable,
            body: ViewBody::Summary { summary },
        }
    }
}

/// Sink that keeps every written view, for tests and JSON responses
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderSink {
    pub views: Vec<SectionView>,
}

impl RecordingRenderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> Vec<&str> {
        self.views.iter().map(|v| v.section.as_str()).collect()
    }
}

impl RenderSink for RecordingRenderSink {
    fn write(&mut self, view: &SectionView) -> Result<(), RenderError> {
        self.views.push(view.clone());
        Ok(())
    }
}

/// Render a section of a placed order. Orders never enter the substep state
/// machine: the summary comes straight from the order record.
pub fn render_order_section(
    provider: &dyn FieldSchemaProvider,
    settings: &Settings,
    order: &OrderRecord,
    section: &str,
    sink: &mut dyn RenderSink,
) -> Result<(), RenderError> {
    let schema = provider.resolve(section, settings);
    if schema.is_empty() {
        return Ok(());
    }
    let summary = SummaryRenderer::from_settings(settings).render(&schema, order);
    sink.write(&SectionView::summary(&schema, summary, false))
}

/// CSS selector of a section's summary block
pub fn fragment_selector(section: &str) -> String {
    format!(".substep-text--{}", section)
}

/// Summary HTML of every applicable section keyed by selector, for partial
/// page refreshes after an update
pub fn fragments(
    renderer: &HtmlRenderer,
    provider: &dyn FieldSchemaProvider,
    settings: &Settings,
    cart: &CartContext,
    source: &dyn ValueSource,
    sections: &[&str],
) -> Result<BTreeMap<String, String>, RenderError> {
    let summaries = SummaryRenderer::from_settings(settings);
    let mut out = BTreeMap::new();

    for section in sections {
        let schema = provider.resolve(section, settings);
        if schema.is_empty() || !cart.applies_to(section) {
            continue;
        }
        let summary = summaries.render(&schema, source);
        out.insert(fragment_selector(section), renderer.summary_html(&summary)?);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BuiltinSchemaProvider, FieldErrorKind};
    use crate::session::SessionRecord;

    fn gift_settings() -> Settings {
        let mut settings = Settings::default();
        settings.gift_options.enabled = true;
        settings
    }

    #[test]
    fn test_form_view_marks_collapsed_optional_fields() {
        let schema = BuiltinSchemaProvider::new().resolve("shipping", &Settings::default());
        let view = SectionView::form(&schema, &schema.defaults(), &[]);

        let ViewBody::Form { fields } = &view.body else {
            panic!("expected form");
        };
        let company = fields.iter().find(|f| f.id == "company").unwrap();
        assert!(company.collapsed);
        let city = fields.iter().find(|f| f.id == "city").unwrap();
        assert!(!city.collapsed);
        let country = fields.iter().find(|f| f.id == "country").unwrap();
        assert!(country.options.iter().any(|o| o.selected && o.value == "US"));
    }

    #[test]
    fn test_form_view_attaches_errors_to_fields() {
        let schema = BuiltinSchemaProvider::new().resolve("contact", &Settings::default());
        let errors = vec![FieldError {
            field: "email".to_string(),
            kind: FieldErrorKind::Required,
        }];
        let view = SectionView::form(&schema, &SectionValues::new(), &errors);

        let ViewBody::Form { fields } = &view.body else {
            panic!("expected form");
        };
        assert_eq!(fields[0].errors, vec!["email: this is a required field"]);
    }

    #[test]
    fn test_form_view_filters_by_visibility() {
        let schema = BuiltinSchemaProvider::new().resolve("billing", &Settings::default());
        let view = SectionView::form(&schema, &schema.defaults(), &[]);

        let ViewBody::Form { fields } = &view.body else {
            panic!("expected form");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id, "same_as_shipping");
    }

    #[test]
    fn test_order_section_renders_summary_without_edit() {
        let mut order = OrderRecord::new("1001");
        order.attributes.insert(
            "gift_options.gift_message".to_string(),
            FieldValue::text("Enjoy"),
        );
        let mut sink = RecordingRenderSink::new();

        render_order_section(
            &BuiltinSchemaProvider::new(),
            &gift_settings(),
            &order,
            "gift_options",
            &mut sink,
        )
        .unwrap();

        assert_eq!(sink.views.len(), 1);
        assert!(!sink.views[0].editable);
        assert!(matches!(sink.views[0].body, ViewBody::Summary { .. }));
    }

    #[test]
    fn test_fragments_skip_hidden_sections() {
        let renderer = HtmlRenderer::new().unwrap();
        let mut record = SessionRecord::default();
        let mut values = SectionValues::new();
        values.insert("order_comments".to_string(), FieldValue::text("Ring twice"));
        record.set_section("order_notes", values);

        let cart = CartContext {
            needs_shipping: false,
        };
        let out = fragments(
            &renderer,
            &BuiltinSchemaProvider::new(),
            &Settings::default(),
            &cart,
            &record,
            &["shipping", "gift_options", "order_notes"],
        )
        .unwrap();

        assert_eq!(out.len(), 1);
        assert!(out[".substep-text--order_notes"].contains("Ring twice"));
    }
}

//! Handlebars rendering of checkout sections.

use std::collections::BTreeMap;
use std::sync::Arc;

use handlebars::Handlebars;
use serde_json::json;

use super::{FieldView, RenderError, RenderSink, SectionView, ViewBody};
use crate::schema::FieldKind;
use crate::summary::Summary;

const FIELD_LABEL: &str = r##"<label for="{{id}}">{{label}}{{#if required}} <abbr class="required" title="required">*</abbr>{{/if}}</label>"##;

const FIELD_TOGGLE: &str = r##"{{#if collapsed}}<a href="#{{id}}_field" class="expansible-section__toggle-plus" data-field="{{id}}">+ Add {{label}}</a>{{/if}}"##;

const FIELD_ERRORS: &str =
    r##"{{#each errors}}<span class="checkout-inline-error-message">{{this}}</span>{{/each}}"##;

const FIELD_TEXT: &str = r##"<p class="form-row{{#if collapsed}} is-collapsed{{/if}}" id="{{id}}_field">{{> field_toggle}}{{> field_label}}<input type="text" class="input-text" name="{{id}}" id="{{id}}" value="{{value}}"{{#if placeholder}} placeholder="{{placeholder}}"{{/if}}{{#if max_length}} maxlength="{{max_length}}"{{/if}} />{{> field_errors}}</p>"##;

const FIELD_TEXTAREA: &str = r##"<p class="form-row{{#if collapsed}} is-collapsed{{/if}}" id="{{id}}_field">{{> field_toggle}}{{> field_label}}<textarea class="input-text" name="{{id}}" id="{{id}}"{{#if placeholder}} placeholder="{{placeholder}}"{{/if}}{{#if max_length}} maxlength="{{max_length}}"{{/if}}>{{value}}</textarea>{{> field_errors}}</p>"##;

const FIELD_SELECT: &str = r##"<p class="form-row" id="{{id}}_field">{{> field_label}}<select name="{{id}}" id="{{id}}">{{#each options}}<option value="{{value}}"{{#if selected}} selected="selected"{{/if}}>{{label}}</option>{{/each}}</select>{{> field_errors}}</p>"##;

const FIELD_CHECKBOX: &str = r##"<p class="form-row form-row--checkbox" id="{{id}}_field"><label class="checkbox"><input type="checkbox" class="input-checkbox" name="{{id}}" id="{{id}}" value="1"{{#if checked}} checked="checked"{{/if}} /> {{label}}</label>{{> field_errors}}</p>"##;

const FIELD_HIDDEN: &str = r##"<input type="hidden" name="{{id}}" id="{{id}}" value="{{value}}" />"##;

const SUMMARY: &str = r##"<div class="substep-text substep-text--{{section}}">{{#each lines}}<span class="substep-text-line">{{text}}</span>{{/each}}</div>"##;

const SUBSTEP: &str = r##"<section class="substep substep--{{section}}" data-substep-id="{{section}}" data-substep-state="{{state}}"><h3 class="substep__title">{{title}}</h3>{{#if form}}<div class="substep__fields">{{{content}}}</div>{{else}}{{{content}}}{{#if editable}}<a href="#" class="substep__edit" data-substep-id="{{section}}">Edit</a>{{/if}}{{/if}}</section>"##;

/// Registry of checkout templates
pub struct HtmlRenderer {
    handlebars: Handlebars<'static>,
}

impl std::fmt::Debug for HtmlRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlRenderer").finish_non_exhaustive()
    }
}

impl HtmlRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);

        let partials: [(&'static str, &'static str); 3] = [
            ("field_label", FIELD_LABEL),
            ("field_toggle", FIELD_TOGGLE),
            ("field_errors", FIELD_ERRORS),
        ];
        for (name, source) in partials {
            handlebars
                .register_partial(name, source)
                .map_err(|e| RenderError::Template {
                    name,
                    source: Box::new(e),
                })?;
        }

        let templates: [(&'static str, &'static str); 7] = [
            ("field_text", FIELD_TEXT),
            ("field_textarea", FIELD_TEXTAREA),
            ("field_select", FIELD_SELECT),
            ("field_checkbox", FIELD_CHECKBOX),
            ("field_hidden", FIELD_HIDDEN),
            ("summary", SUMMARY),
            ("substep", SUBSTEP),
        ];
        for (name, source) in templates {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| RenderError::Template {
                    name,
                    source: Box::new(e),
                })?;
        }

        Ok(Self { handlebars })
    }

    fn render(&self, section: &str, template: &str, data: &impl serde::Serialize) -> Result<String, RenderError> {
        self.handlebars
            .render(template, data)
            .map_err(|source| RenderError::Render {
                section: section.to_string(),
                source,
            })
    }

    /// Summary block of a collapsed section
    pub fn summary_html(&self, summary: &Summary) -> Result<String, RenderError> {
        self.render(&summary.section, "summary", summary)
    }

    fn field_html(&self, section: &str, field: &FieldView) -> Result<String, RenderError> {
        self.render(section, field.template, field)
    }

    /// Complete markup of a section view
    pub fn section_html(&self, view: &SectionView) -> Result<String, RenderError> {
        let (form, content) = match &view.body {
            ViewBody::Form { fields } => {
                let html = fields
                    .iter()
                    .map(|f| self.field_html(&view.section, f))
                    .collect::<Result<Vec<_>, _>>()?;
                (true, html.concat())
            }
            ViewBody::Summary { summary } => (false, self.summary_html(summary)?),
        };

        let data = json!({
            "section": view.section,
            "title": view.title,
            "state": view.state,
            "editable": view.editable,
            "form": form,
            "content": content,
        });
        self.render(&view.section, "substep", &data)
    }
}

/// Template rendering a field kind
pub(super) fn template_for(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "field_text",
        FieldKind::Textarea => "field_textarea",
        FieldKind::Select { .. } => "field_select",
        FieldKind::Checkbox => "field_checkbox",
        FieldKind::Hidden => "field_hidden",
    }
}

/// Sink collecting section markup in write order
#[derive(Debug)]
pub struct HtmlRenderSink {
    renderer: Arc<HtmlRenderer>,
    sections: Vec<(String, String)>,
}

impl HtmlRenderSink {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self::with_renderer(Arc::new(HtmlRenderer::new()?)))
    }

    /// Sink sharing an already built template registry
    pub fn with_renderer(renderer: Arc<HtmlRenderer>) -> Self {
        Self {
            renderer,
            sections: Vec::new(),
        }
    }

    /// Markup of one written section
    pub fn section(&self, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, html)| html.as_str())
    }

    pub fn sections(&self) -> BTreeMap<String, String> {
        self.sections.iter().cloned().collect()
    }

    /// All written sections concatenated
    pub fn into_html(self) -> String {
        self.sections
            .into_iter()
            .map(|(_, html)| html)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl RenderSink for HtmlRenderSink {
    fn write(&mut self, view: &SectionView) -> Result<(), RenderError> {
        let html = self.renderer.section_html(view)?;
        self.sections.push((view.section.clone(), html));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BuiltinSchemaProvider, FieldSchemaProvider, FieldValue, SectionValues, Settings};
    use crate::summary::SummaryRenderer;

    fn gift_schema() -> crate::schema::SectionSchema {
        let mut settings = Settings::default();
        settings.gift_options.enabled = true;
        settings.gift_options.message_max_length = Some(100);
        BuiltinSchemaProvider::new().resolve("gift_options", &settings)
    }

    #[test]
    fn test_form_uses_template_per_kind() {
        let schema = gift_schema();
        let mut sink = HtmlRenderSink::new().unwrap();
        sink.write(&SectionView::form(&schema, &schema.defaults(), &[]))
            .unwrap();

        let html = sink.section("gift_options").unwrap();
        assert!(html.contains("<textarea"));
        assert!(html.contains(r#"maxlength="100""#));
        assert!(html.contains(r#"<input type="text" class="input-text" name="gift_from""#));
        assert!(html.contains(r#"data-substep-state="editing""#));
    }

    #[test]
    fn test_values_are_escaped() {
        let schema = gift_schema();
        let mut values = SectionValues::new();
        values.insert(
            "gift_message".to_string(),
            FieldValue::text("<script>alert(1)</script>"),
        );
        let summary = SummaryRenderer::default().render(&schema, &values);

        let renderer = HtmlRenderer::new().unwrap();
        let html = renderer.summary_html(&summary).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_review_offers_edit_link() {
        let schema = gift_schema();
        let summary = SummaryRenderer::default().render(&schema, &SectionValues::new());
        let mut sink = HtmlRenderSink::new().unwrap();
        sink.write(&SectionView::summary(&schema, summary, true)).unwrap();

        let html = sink.into_html();
        assert!(html.contains(r##"<a href="#" class="substep__edit" data-substep-id="gift_options">Edit</a>"##));
        assert!(html.contains("None."));
    }

    #[test]
    fn test_collapsed_field_has_add_toggle() {
        let schema = BuiltinSchemaProvider::new().resolve("order_notes", &Settings::default());
        let mut sink = HtmlRenderSink::new().unwrap();
        sink.write(&SectionView::form(&schema, &schema.defaults(), &[]))
            .unwrap();

        let html = sink.section("order_notes").unwrap();
        assert!(html.contains("+ Add Order notes"));
        assert!(html.contains(r##"href="#order_comments_field""##));
    }
}

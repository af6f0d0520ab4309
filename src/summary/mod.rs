//! Read-only summaries of collapsed sections.
//!
//! The renderer never knows which store backs it: session records and order
//! records are both read through [`ValueSource`].

use serde::Serialize;

use crate::order::OrderRecord;
use crate::schema::{
    sections, FieldDefinition, FieldKind, FieldSchemaProvider, FieldValue,
    SectionSchema, SectionValues, Settings, SummaryStyle,
};
use crate::session::SessionRecord;

/// Uniform value lookup over session and order storage
pub trait ValueSource {
    fn value(&self, section: &str, field: &str) -> Option<FieldValue>;

    /// Values of every field of a schema; missing ones read as empty
    fn section_values(&self, schema: &SectionSchema) -> SectionValues {
        schema
            .fields
            .iter()
            .map(|f| {
                let value = self
                    .value(&schema.key, &f.id)
                    .unwrap_or_else(|| f.kind.empty_value());
                (f.id.clone(), value)
            })
            .collect()
    }
}

impl ValueSource for SessionRecord {
    fn value(&self, section: &str, field: &str) -> Option<FieldValue> {
        self.section(section).and_then(|values| values.get(field).cloned())
    }
}

impl ValueSource for OrderRecord {
    fn value(&self, section: &str, field: &str) -> Option<FieldValue> {
        self.get(section, field).cloned()
    }
}

/// Values of a single section, e.g. the controller's staging area
impl ValueSource for SectionValues {
    fn value(&self, _section: &str, field: &str) -> Option<FieldValue> {
        self.get(field).cloned()
    }
}

/// One line of a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    /// Field the line came from; `None` for the placeholder
    pub field: Option<String>,
    pub text: String,
}

/// Collapsed representation of a section. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub section: String,
    pub lines: Vec<SummaryLine>,
}

impl Summary {
    /// Whether the summary is only the "none" placeholder
    pub fn is_placeholder(&self) -> bool {
        self.lines.iter().all(|l| l.field.is_none())
    }

    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Projects section values onto summary lines
#[derive(Debug, Clone)]
pub struct SummaryRenderer {
    none_placeholder: String,
}

impl Default for SummaryRenderer {
    fn default() -> Self {
        Self::new("None.")
    }
}

impl SummaryRenderer {
    pub fn new(none_placeholder: impl Into<String>) -> Self {
        Self {
            none_placeholder: none_placeholder.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.summary.none_placeholder.clone())
    }

    pub fn render(&self, schema: &SectionSchema, source: &dyn ValueSource) -> Summary {
        let values = source.section_values(schema);

        let mut lines: Vec<SummaryLine> = schema
            .visible_fields(&values)
            .filter(|field| partner_filled(field, &values))
            .filter_map(|field| {
                let value = values.get(&field.id)?;
                summary_text(field, value).map(|text| SummaryLine {
                    field: Some(field.id.clone()),
                    text,
                })
            })
            .collect();

        if lines.is_empty() {
            lines.push(SummaryLine {
                field: None,
                text: self.none_placeholder.clone(),
            });
        }

        Summary {
            section: schema.key.clone(),
            lines,
        }
    }
}

/// A field paired with an empty partner is never summarized
fn partner_filled(field: &FieldDefinition, values: &SectionValues) -> bool {
    match &field.paired_with {
        Some(partner) => values.get(partner).is_some_and(|v| !v.is_empty()),
        None => true,
    }
}

fn summary_text(field: &FieldDefinition, value: &FieldValue) -> Option<String> {
    if value.is_empty() {
        return None;
    }

    let shown = match (&field.kind, value) {
        (FieldKind::Checkbox, _) => "Yes".to_string(),
        (FieldKind::Select { .. }, FieldValue::Text(raw)) => field.option_label(raw).to_string(),
        (_, v) => v.to_string(),
    };

    match field.summary_style {
        SummaryStyle::Value if field.kind == FieldKind::Checkbox => Some(field.label.clone()),
        SummaryStyle::Value => Some(shown),
        SummaryStyle::Labeled => Some(format!("{}: {}", field.label, shown)),
        SummaryStyle::LabelWhenChecked => value.is_checked().then(|| field.label.clone()),
        SummaryStyle::Omit => None,
    }
}

/// A labelled row in the order details table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub label: String,
    pub value: String,
}

/// Gift information shown on order pages after checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    /// Rows appended to the order totals table
    pub rows: Vec<DetailRow>,
    /// Separate gift block, used when rows are not
    pub gift_section: Option<Summary>,
}

/// Gift details of an order, read straight from the order record
pub fn order_detail_rows(
    order: &OrderRecord,
    provider: &dyn FieldSchemaProvider,
    settings: &Settings,
) -> OrderDetails {
    let schema = provider.resolve(sections::GIFT_OPTIONS, settings);
    if schema.is_empty() {
        return OrderDetails::default();
    }

    let values = order.section_values(&schema);
    let message = values.get("gift_message").cloned().unwrap_or_default();
    if message.is_empty() {
        return OrderDetails::default();
    }

    if settings.gift_options.display_in_order_details {
        let mut rows = vec![DetailRow {
            label: "Gift message:".to_string(),
            value: message.to_string(),
        }];
        if let Some(from) = values.get("gift_from").filter(|v| !v.is_empty()) {
            rows.push(DetailRow {
                label: "Gift message from:".to_string(),
                value: from.to_string(),
            });
        }
        OrderDetails {
            rows,
            gift_section: None,
        }
    } else {
        OrderDetails {
            rows: Vec::new(),
            gift_section: Some(SummaryRenderer::from_settings(settings).render(&schema, order)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::attribute_key;
    use crate::schema::BuiltinSchemaProvider;

    fn gift_settings() -> Settings {
        let mut settings = Settings::default();
        settings.gift_options.enabled = true;
        settings
    }

    fn gift_schema() -> SectionSchema {
        BuiltinSchemaProvider::new().resolve("gift_options", &gift_settings())
    }

    fn session_with(section: &str, pairs: &[(&str, FieldValue)]) -> SessionRecord {
        let mut record = SessionRecord::default();
        record.set_section(
            section,
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        );
        record
    }

    #[test]
    fn test_message_only_renders_single_line() {
        let session = session_with(
            "gift_options",
            &[("gift_message", "Happy birthday!".into()), ("gift_from", "".into())],
        );

        let summary = SummaryRenderer::default().render(&gift_schema(), &session);
        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.to_text(), "Happy birthday!");
        assert!(!summary.is_placeholder());
    }

    #[test]
    fn test_empty_section_renders_placeholder() {
        let summary = SummaryRenderer::default().render(&gift_schema(), &SessionRecord::default());
        assert_eq!(summary.to_text(), "None.");
        assert!(summary.is_placeholder());

        let custom = SummaryRenderer::new("Nothing added").render(&gift_schema(), &SectionValues::new());
        assert_eq!(custom.to_text(), "Nothing added");
    }

    #[test]
    fn test_dangling_from_is_not_summarized() {
        let session = session_with(
            "gift_options",
            &[("gift_message", "".into()), ("gift_from", "Ana".into())],
        );
        let summary = SummaryRenderer::default().render(&gift_schema(), &session);
        assert!(summary.is_placeholder());
    }

    #[test]
    fn test_session_and_order_render_identically() {
        let session = session_with(
            "gift_options",
            &[("gift_message", "Enjoy".into()), ("gift_from", "Bo".into())],
        );
        let mut order = OrderRecord::new("1001");
        order.attributes.insert(
            attribute_key("gift_options", "gift_message"),
            FieldValue::text("Enjoy"),
        );
        order
            .attributes
            .insert(attribute_key("gift_options", "gift_from"), FieldValue::text("Bo"));

        let renderer = SummaryRenderer::default();
        let from_session = renderer.render(&gift_schema(), &session);
        let from_order = renderer.render(&gift_schema(), &order);
        assert_eq!(from_session, from_order);
        assert_eq!(from_order.to_text(), "Enjoy\nFrom: Bo");
    }

    #[test]
    fn test_billing_same_as_shipping_hides_address() {
        let schema = BuiltinSchemaProvider::new().resolve("billing", &Settings::default());
        let session = session_with(
            "billing",
            &[
                ("same_as_shipping", FieldValue::Bool(true)),
                ("billing_city", "Lisbon".into()),
            ],
        );

        let summary = SummaryRenderer::default().render(&schema, &session);
        assert_eq!(summary.to_text(), "Same as shipping address");
    }

    #[test]
    fn test_select_renders_option_label() {
        let schema = BuiltinSchemaProvider::new().resolve("shipping", &Settings::default());
        let session = session_with("shipping", &[("country", "CA".into())]);

        let summary = SummaryRenderer::default().render(&schema, &session);
        assert_eq!(summary.to_text(), "Canada");
    }

    #[test]
    fn test_order_detail_rows_in_table() {
        let mut settings = gift_settings();
        settings.gift_options.display_in_order_details = true;
        let mut order = OrderRecord::new("1001");
        order.attributes.insert(
            attribute_key("gift_options", "gift_message"),
            FieldValue::text("Enjoy"),
        );
        order
            .attributes
            .insert(attribute_key("gift_options", "gift_from"), FieldValue::text("Bo"));

        let details = order_detail_rows(&order, &BuiltinSchemaProvider::new(), &settings);
        assert_eq!(details.rows.len(), 2);
        assert_eq!(details.rows[1].label, "Gift message from:");
        assert!(details.gift_section.is_none());
    }

    #[test]
    fn test_order_detail_separate_section_only_with_message() {
        let settings = gift_settings();
        let provider = BuiltinSchemaProvider::new();

        let empty = order_detail_rows(&OrderRecord::new("1"), &provider, &settings);
        assert_eq!(empty, OrderDetails::default());

        let mut order = OrderRecord::new("2");
        order.attributes.insert(
            attribute_key("gift_options", "gift_message"),
            FieldValue::text("Enjoy"),
        );
        let details = order_detail_rows(&order, &provider, &settings);
        assert!(details.rows.is_empty());
        assert_eq!(details.gift_section.unwrap().to_text(), "Enjoy");
    }
}

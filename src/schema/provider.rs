//! Schema resolution from settings.

use super::settings::{PhoneVisibility, Settings};
use super::{
    sections, FieldDefinition, FieldKind, FieldValue, SectionSchema, SelectOption, SummaryStyle,
    ValidationRule, Visibility,
};

/// Resolves the active fields of a section.
///
/// Implementations must be pure functions of `settings`: identical settings
/// yield identical schemas, so callers may cache per request. Unknown
/// sections resolve to an empty schema.
pub trait FieldSchemaProvider: Send + Sync {
    fn resolve(&self, section: &str, settings: &Settings) -> SectionSchema;
}

/// Facts about the cart that decide whether a section applies at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartContext {
    /// False for carts holding only virtual products
    pub needs_shipping: bool,
}

impl Default for CartContext {
    fn default() -> Self {
        Self {
            needs_shipping: true,
        }
    }
}

impl CartContext {
    /// Whether the section is relevant for this cart
    pub fn applies_to(&self, section: &str) -> bool {
        match section {
            sections::SHIPPING => self.needs_shipping,
            _ => true,
        }
    }
}

/// Fields that are never hidden behind an "add" link
const HIDE_OPTIONAL_SKIP_LIST: &[&str] = &["gift_message", "gift_from", "same_as_shipping"];

/// Provider for the built-in checkout sections
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSchemaProvider;

impl BuiltinSchemaProvider {
    pub fn new() -> Self {
        Self
    }

    fn contact(&self) -> SectionSchema {
        SectionSchema {
            key: sections::CONTACT.to_string(),
            title: "Contact".to_string(),
            fields: vec![FieldDefinition::new("email", FieldKind::Text, "Email address")
                .required()
                .with_placeholder("you@example.com")
                .with_validation(ValidationRule::Email)],
        }
    }

    fn address_fields(&self, prefix: &str, settings: &Settings) -> Vec<FieldDefinition> {
        let id = |name: &str| format!("{}{}", prefix, name);
        let countries = settings
            .shipping
            .countries
            .iter()
            .map(|code| SelectOption::new(code.clone(), country_name(code)))
            .collect();

        vec![
            FieldDefinition::new(id("first_name"), FieldKind::Text, "First name").required(),
            FieldDefinition::new(id("last_name"), FieldKind::Text, "Last name").required(),
            FieldDefinition::new(id("company"), FieldKind::Text, "Company"),
            FieldDefinition::new(id("address_1"), FieldKind::Text, "Street address")
                .required()
                .with_placeholder("House number and street name"),
            FieldDefinition::new(id("address_2"), FieldKind::Text, "Apartment, suite, unit")
                .with_placeholder("Apartment, suite, unit, etc."),
            FieldDefinition::new(id("city"), FieldKind::Text, "Town / City").required(),
            FieldDefinition::new(id("postcode"), FieldKind::Text, "Postcode / ZIP").required(),
            FieldDefinition::new(id("country"), FieldKind::Select { options: countries }, "Country")
                .required()
                .with_default(
                    settings
                        .shipping
                        .countries
                        .first()
                        .map(|c| FieldValue::text(c.clone()))
                        .unwrap_or_default(),
                ),
        ]
    }

    fn shipping(&self, settings: &Settings) -> SectionSchema {
        let mut fields = self.address_fields("", settings);
        match settings.shipping.phone {
            PhoneVisibility::No => {}
            PhoneVisibility::Optional => {
                fields.push(FieldDefinition::new("phone", FieldKind::Text, "Shipping phone"));
            }
            PhoneVisibility::Required => {
                fields.push(
                    FieldDefinition::new("phone", FieldKind::Text, "Shipping phone").required(),
                );
            }
        }
        SectionSchema {
            key: sections::SHIPPING.to_string(),
            title: "Shipping address".to_string(),
            fields,
        }
    }

    fn billing(&self, settings: &Settings) -> SectionSchema {
        let same = FieldDefinition::new(
            "same_as_shipping",
            FieldKind::Checkbox,
            "Same as shipping address",
        )
        .with_default(FieldValue::Bool(settings.billing.same_as_shipping))
        .with_summary_style(SummaryStyle::LabelWhenChecked);

        let mut fields = vec![same];
        fields.extend(
            self.address_fields("billing_", settings)
                .into_iter()
                .map(|f| f.with_visibility(Visibility::WhenUnchecked("same_as_shipping".into()))),
        );
        SectionSchema {
            key: sections::BILLING.to_string(),
            title: "Billing address".to_string(),
            fields,
        }
    }

    fn gift_options(&self, settings: &Settings) -> SectionSchema {
        if !settings.gift_options.enabled {
            return SectionSchema::empty(sections::GIFT_OPTIONS);
        }

        let message_description = match settings.gift_options.message_max_length {
            Some(max) => format!(
                "Brief message with up to {} characters, printed on the packing slip.",
                max
            ),
            None => "Brief message, printed on the packing slip.".to_string(),
        };

        SectionSchema {
            key: sections::GIFT_OPTIONS.to_string(),
            title: "Gift options".to_string(),
            fields: vec![
                FieldDefinition::new("gift_message", FieldKind::Textarea, "Gift message")
                    .with_placeholder(message_description)
                    .with_max_length(settings.gift_options.message_max_length),
                FieldDefinition::new("gift_from", FieldKind::Text, "From")
                    .with_placeholder("Your name")
                    .with_max_length(settings.gift_options.from_max_length)
                    .with_summary_style(SummaryStyle::Labeled)
                    .paired_with("gift_message"),
            ],
        }
    }

    fn order_notes(&self) -> SectionSchema {
        SectionSchema {
            key: sections::ORDER_NOTES.to_string(),
            title: "Order notes".to_string(),
            fields: vec![FieldDefinition::new(
                "order_comments",
                FieldKind::Textarea,
                "Order notes",
            )
            .with_placeholder("Notes about your order, e.g. special notes for delivery.")],
        }
    }

    /// Mark optional text fields as collapsible when hiding is enabled
    fn apply_optional_hiding(&self, mut schema: SectionSchema, settings: &Settings) -> SectionSchema {
        if !settings.optional_fields.hide {
            return schema;
        }
        for field in &mut schema.fields {
            let text_like = matches!(field.kind, FieldKind::Text | FieldKind::Textarea);
            let skipped = HIDE_OPTIONAL_SKIP_LIST.contains(&field.id.as_str())
                || (settings.optional_fields.skip_address_2 && field.id.ends_with("address_2"));
            field.collapsible = text_like && !field.required && !skipped;
        }
        schema
    }
}

impl FieldSchemaProvider for BuiltinSchemaProvider {
    fn resolve(&self, section: &str, settings: &Settings) -> SectionSchema {
        let schema = match section {
            sections::CONTACT => self.contact(),
            sections::SHIPPING => self.shipping(settings),
            sections::BILLING => self.billing(settings),
            sections::GIFT_OPTIONS => self.gift_options(settings),
            sections::ORDER_NOTES => self.order_notes(),
            other => {
                tracing::debug!(section = other, "Unknown section resolves to empty schema");
                return SectionSchema::empty(other);
            }
        };
        self.apply_optional_hiding(schema, settings)
    }
}

fn country_name(code: &str) -> String {
    match code {
        "US" => "United States".to_string(),
        "CA" => "Canada".to_string(),
        "GB" => "United Kingdom".to_string(),
        "DE" => "Germany".to_string(),
        "FR" => "France".to_string(),
        "BR" => "Brazil".to_string(),
        other => other.to_string(),
    }
}

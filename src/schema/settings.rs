//! Immutable checkout settings snapshot.
//!
//! Settings are read once per request and passed by reference into schema
//! resolution and the substep controller. Nothing below this module reads
//! configuration on its own.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Checkout page layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckoutLayout {
    /// Sections collapse into a summary once completed
    #[default]
    MultiStep,
    /// Every section stays open on one page
    SingleStep,
}

impl CheckoutLayout {
    /// Whether completed sections can collapse into a summary
    pub fn supports_collapsing(&self) -> bool {
        matches!(self, CheckoutLayout::MultiStep)
    }
}

/// Whether the shipping phone field exists and if it must be filled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneVisibility {
    #[default]
    No,
    Optional,
    Required,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSettings {
    #[serde(default)]
    pub layout: CheckoutLayout,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            layout: CheckoutLayout::MultiStep,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalFieldsSettings {
    /// Hide optional fields behind an "add" link
    #[serde(default = "default_true")]
    pub hide: bool,
    /// Keep the second address line visible even when hiding optional fields
    #[serde(default)]
    pub skip_address_2: bool,
}

impl Default for OptionalFieldsSettings {
    fn default() -> Self {
        Self {
            hide: true,
            skip_address_2: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSettings {
    /// Default state of the "same as shipping" checkbox
    #[serde(default = "default_true")]
    pub same_as_shipping: bool,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            same_as_shipping: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSettings {
    #[serde(default)]
    pub phone: PhoneVisibility,
    /// Country codes offered in the country select
    #[serde(default = "default_countries")]
    pub countries: Vec<String>,
}

fn default_countries() -> Vec<String> {
    vec!["US".to_string(), "CA".to_string(), "GB".to_string()]
}

impl Default for ShippingSettings {
    fn default() -> Self {
        Self {
            phone: PhoneVisibility::No,
            countries: default_countries(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftOptionsSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub message_max_length: Option<usize>,
    #[serde(default)]
    pub from_max_length: Option<usize>,
    /// Show the gift message as rows of the order details table instead of
    /// a separate section below it
    #[serde(default)]
    pub display_in_order_details: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySettings {
    /// Line shown for a section with no values
    #[serde(default = "default_none_placeholder")]
    pub none_placeholder: String,
}

fn default_none_placeholder() -> String {
    "None.".to_string()
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            none_placeholder: default_none_placeholder(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Snapshot of every toggle that influences which fields exist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub checkout: LayoutSettings,
    #[serde(default)]
    pub optional_fields: OptionalFieldsSettings,
    #[serde(default)]
    pub billing: BillingSettings,
    #[serde(default)]
    pub shipping: ShippingSettings,
    #[serde(default)]
    pub gift_options: GiftOptionsSettings,
    #[serde(default)]
    pub summary: SummarySettings,
}

impl Settings {
    /// Build settings from a flat mapping of dotted keys, e.g.
    /// `gift_options.enabled = true`. Missing keys keep their defaults and
    /// unknown keys are ignored.
    pub fn from_flat<'a, I>(entries: I) -> Result<Self, serde_json::Error>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut root = Map::new();
        for (key, value) in entries {
            insert_dotted(&mut root, key, value);
        }
        serde_json::from_value(Value::Object(root))
    }

    /// Flatten back into dotted keys
    pub fn to_flat(&self) -> Result<Vec<(String, Value)>, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        let mut out = Vec::new();
        flatten_into(&mut out, String::new(), value);
        Ok(out)
    }

    pub fn layout(&self) -> CheckoutLayout {
        self.checkout.layout
    }
}

fn insert_dotted(root: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            root.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_dotted(map, rest, value);
            }
        }
    }
}

fn flatten_into(out: &mut Vec<(String, Value)>, prefix: String, value: Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_into(out, key, v);
            }
        }
        other => out.push((prefix, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_documented_defaults() {
        let settings = Settings::default();
        assert!(!settings.gift_options.enabled);
        assert!(settings.optional_fields.hide);
        assert!(settings.billing.same_as_shipping);
        assert_eq!(settings.shipping.phone, PhoneVisibility::No);
        assert_eq!(settings.layout(), CheckoutLayout::MultiStep);
        assert_eq!(settings.summary.none_placeholder, "None.");
    }

    #[test]
    fn test_from_flat() {
        let settings = Settings::from_flat([
            ("gift_options.enabled", json!(true)),
            ("gift_options.message_max_length", json!(120)),
            ("checkout.layout", json!("single-step")),
            ("shipping.phone", json!("required")),
            ("unknown.toggle", json!("ignored")),
        ])
        .unwrap();

        assert!(settings.gift_options.enabled);
        assert_eq!(settings.gift_options.message_max_length, Some(120));
        assert_eq!(settings.layout(), CheckoutLayout::SingleStep);
        assert_eq!(settings.shipping.phone, PhoneVisibility::Required);
        // Untouched sections keep their defaults
        assert!(settings.optional_fields.hide);
    }

    #[test]
    fn test_from_flat_empty_is_default() {
        let settings = Settings::from_flat(std::iter::empty()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_flat_roundtrip_keys() {
        let flat = Settings::default().to_flat().unwrap();
        assert!(flat.iter().any(|(k, _)| k == "gift_options.enabled"));
        assert!(flat.iter().any(|(k, _)| k == "optional_fields.hide"));
    }

    #[test]
    fn test_single_step_cannot_collapse() {
        assert!(CheckoutLayout::MultiStep.supports_collapsing());
        assert!(!CheckoutLayout::SingleStep.supports_collapsing());
    }
}

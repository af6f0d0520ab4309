//! Durable order attributes and the commit that fills them.
//!
//! Once an order exists its [`OrderRecord`] is authoritative; the session
//! values it was built from are discarded.

mod committer;
mod file;
mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::schema::{FieldValue, SectionSchema, SectionValues};

pub use committer::{order_attributes, CommitReport, OrderCommitter, SectionCommit};
pub use file::FileOrderStore;
pub use memory::MemoryOrderStore;

/// Attribute key under which a section field is stored on an order
pub fn attribute_key(section: &str, field: &str) -> String {
    format!("{}.{}", section, field)
}

/// Keyed attribute storage for orders.
///
/// Implementations must give read-your-writes consistency within a commit.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, order_id: &str, key: &str) -> Result<Option<FieldValue>, PersistenceError>;

    async fn set(&self, order_id: &str, key: &str, value: FieldValue)
        -> Result<(), PersistenceError>;

    /// Remove one attribute; removing a missing attribute is not an error
    async fn delete(&self, order_id: &str, key: &str) -> Result<(), PersistenceError>;

    /// Every attribute of an order; empty for unknown orders
    async fn record(&self, order_id: &str) -> Result<OrderRecord, PersistenceError>;
}

/// All attributes persisted against one order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, FieldValue>,
}

impl OrderRecord {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn get(&self, section: &str, field: &str) -> Option<&FieldValue> {
        self.attributes.get(&attribute_key(section, field))
    }

    /// Values of a section's fields; absent attributes read as the field's
    /// empty value
    pub fn section_values(&self, schema: &SectionSchema) -> SectionValues {
        schema
            .fields
            .iter()
            .map(|field| {
                let value = self
                    .get(&schema.key, &field.id)
                    .cloned()
                    .unwrap_or_else(|| field.kind.empty_value());
                (field.id.clone(), value)
            })
            .collect()
    }

    /// Whether any attribute of the section is present
    pub fn has_section(&self, section: &str) -> bool {
        let prefix = format!("{}.", section);
        self.attributes.keys().any(|k| k.starts_with(&prefix))
    }
}

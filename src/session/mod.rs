//! Per-customer store of pending checkout values.
//!
//! The session is the single source of truth for a section until an order is
//! placed. A [`SessionStore`] is an explicit handle bound to one session id;
//! there is no ambient session.

mod file;
mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use backon::Retryable;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::PersistenceError;
use crate::retry::RetryPolicy;
use crate::schema::{SectionSchema, SectionValues};

pub use file::FileSessionBackend;
pub use memory::MemorySessionBackend;

/// Every section's pending values for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionRecord {
    sections: BTreeMap<String, SectionValues>,
}

impl SessionRecord {
    pub fn section(&self, key: &str) -> Option<&SectionValues> {
        self.sections.get(key)
    }

    pub fn set_section(&mut self, key: &str, values: SectionValues) {
        self.sections.insert(key.to_string(), values);
    }

    pub fn remove_section(&mut self, key: &str) -> Option<SectionValues> {
        self.sections.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section_keys(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

/// Storage behind sessions. Writes replace a whole section at once so no
/// reader ever observes a partially merged section.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Load a session; unknown sessions are empty
    async fn load(&self, session_id: &str) -> Result<SessionRecord, PersistenceError>;

    /// Replace one section of a session, creating the session if needed
    async fn write_section(
        &self,
        session_id: &str,
        section: &str,
        values: SectionValues,
    ) -> Result<(), PersistenceError>;

    /// Drop one section of a session
    async fn clear_section(&self, session_id: &str, section: &str)
        -> Result<(), PersistenceError>;

    /// Drop the whole session (abandoned checkout)
    async fn destroy(&self, session_id: &str) -> Result<(), PersistenceError>;
}

/// Normalize submitted values against a schema.
///
/// Unknown field ids are dropped, missing ones take the field default and
/// every value is coerced to its field kind. The result always holds exactly
/// one entry per schema field.
pub fn normalize(schema: &SectionSchema, mut input: SectionValues) -> SectionValues {
    let mut normalized = SectionValues::new();
    for field in &schema.fields {
        let value = match input.remove(&field.id) {
            Some(value) => field.kind.coerce(value),
            None => field.default_value(),
        };
        normalized.insert(field.id.clone(), value);
    }

    if !input.is_empty() {
        let dropped: Vec<&String> = input.keys().collect();
        debug!(
            section = %schema.key,
            fields = ?dropped,
            "Dropping fields absent from the current schema"
        );
    }

    normalized
}

/// Handle to one customer's session
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    session_id: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session_id", &self.session_id)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, session_id: impl Into<String>) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Use a custom retry policy for writes
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stored values of a section; empty when nothing was saved
    pub async fn get(&self, section: &str) -> Result<SectionValues, PersistenceError> {
        let record = self.backend.load(&self.session_id).await?;
        Ok(record.section(section).cloned().unwrap_or_default())
    }

    /// Stored values re-normalized against the current schema, so settings
    /// changed since the write never leak stale or missing fields
    pub async fn get_resolved(
        &self,
        schema: &SectionSchema,
    ) -> Result<SectionValues, PersistenceError> {
        let stored = self.get(&schema.key).await?;
        Ok(normalize(schema, stored))
    }

    /// Whether the section was ever written in this session
    pub async fn has_section(&self, section: &str) -> Result<bool, PersistenceError> {
        let record = self.backend.load(&self.session_id).await?;
        Ok(record.section(section).is_some())
    }

    /// Every section of the session
    pub async fn record(&self) -> Result<SessionRecord, PersistenceError> {
        self.backend.load(&self.session_id).await
    }

    /// Normalize and store a section, replacing what was there.
    /// Returns the values as stored.
    #[instrument(skip(self, schema, values), fields(session = %self.session_id, section = %schema.key))]
    pub async fn set(
        &self,
        schema: &SectionSchema,
        values: SectionValues,
    ) -> Result<SectionValues, PersistenceError> {
        let normalized = normalize(schema, values);

        let op = || async {
            self.backend
                .write_section(&self.session_id, &schema.key, normalized.clone())
                .await
        };

        op.retry(self.retry.strategy())
            .when(PersistenceError::is_retryable)
            .notify(|err, dur| {
                warn!("Retrying session write after {:?}: {}", dur, err);
            })
            .await?;

        Ok(normalized)
    }

    /// Remove a section from the session
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn clear(&self, section: &str) -> Result<(), PersistenceError> {
        let op = || async { self.backend.clear_section(&self.session_id, section).await };

        op.retry(self.retry.strategy())
            .when(PersistenceError::is_retryable)
            .notify(|err, dur| {
                warn!("Retrying session clear after {:?}: {}", dur, err);
            })
            .await
    }

    /// Drop everything for an abandoned checkout
    pub async fn abandon(&self) -> Result<(), PersistenceError> {
        debug!(session = %self.session_id, "Abandoning checkout session");
        self.backend.destroy(&self.session_id).await
    }
}

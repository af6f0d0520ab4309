//! Promotion of session values onto the order at checkout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::Retryable;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::{attribute_key, OrderRecord, OrderStore};
use crate::error::{CheckoutError, PersistenceError};
use crate::retry::RetryPolicy;
use crate::schema::{FieldSchemaProvider, FieldValue, SectionSchema, SectionValues, Settings};
use crate::session::SessionStore;

/// Outcome of committing one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionCommit {
    pub section: String,
    /// Attribute keys written with a value
    pub written: Vec<String>,
    /// Attribute keys removed because the value was empty
    pub deleted: Vec<String>,
    /// Attempts needed, including the successful one
    pub attempts: usize,
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub order_id: String,
    pub sections: Vec<SectionCommit>,
    /// Sections with no fields under the current settings
    pub skipped: Vec<String>,
    /// Sections whose session values could not be cleared afterwards
    pub uncleared: Vec<String>,
}

/// Writes resolved session values to the order store.
///
/// The commit is all-or-nothing from the customer's point of view: either
/// every section lands on the order and the session is cleared, or the
/// commit aborts and the session keeps every value for another attempt.
pub struct OrderCommitter {
    provider: Arc<dyn FieldSchemaProvider>,
    store: Arc<dyn OrderStore>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl OrderCommitter {
    pub fn new(provider: Arc<dyn FieldSchemaProvider>, store: Arc<dyn OrderStore>) -> Self {
        Self {
            provider,
            store,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create with custom retry settings and hard timeout
    pub fn with_retry_config(mut self, retry: RetryPolicy, timeout: Duration) -> Self {
        self.retry = retry;
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Commit the given sections of a session onto an order
    #[instrument(skip(self, session, settings), fields(session = %session.session_id()))]
    pub async fn commit(
        &self,
        order_id: &str,
        session: &SessionStore,
        settings: &Settings,
        sections: &[&str],
    ) -> Result<CommitReport, CheckoutError> {
        let started = Instant::now();

        // Deadline covers order writes only; clearing runs after it
        let result = tokio::time::timeout(
            self.timeout,
            self.write_sections(order_id, session, settings, sections),
        )
        .await;

        match result {
            Ok(Ok(mut report)) => {
                self.clear_committed(session, &mut report).await;
                info!(
                    order_id,
                    sections = report.sections.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Committed checkout sections to order"
                );
                Ok(report)
            }
            Ok(Err(e)) => {
                error!(order_id, "Order commit aborted: {}", e);
                Err(e)
            }
            Err(_) => {
                let elapsed = started.elapsed();
                error!(order_id, ?elapsed, "Order commit timed out");
                Err(CheckoutError::CommitTimedOut {
                    order_id: order_id.to_string(),
                    elapsed,
                })
            }
        }
    }

    async fn write_sections(
        &self,
        order_id: &str,
        session: &SessionStore,
        settings: &Settings,
        sections: &[&str],
    ) -> Result<CommitReport, CheckoutError> {
        let mut report = CommitReport {
            order_id: order_id.to_string(),
            ..CommitReport::default()
        };

        for section in sections {
            let schema = self.provider.resolve(section, settings);
            if schema.is_empty() {
                report.skipped.push((*section).to_string());
                continue;
            }

            let abort = |source: PersistenceError| CheckoutError::CommitAborted {
                order_id: order_id.to_string(),
                section: (*section).to_string(),
                source,
            };

            let values = session.get_resolved(&schema).await.map_err(abort)?;
            let attributes = order_attributes(&schema, &values);

            let attempts = AtomicUsize::new(0);
            let op = || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                self.write_attributes(order_id, &attributes).await
            };

            op.retry(self.retry.strategy())
                .when(PersistenceError::is_retryable)
                .notify(|err, dur| {
                    warn!(
                        order_id,
                        section = *section,
                        "Retrying order section write after {:?}: {}",
                        dur,
                        err
                    );
                })
                .await
                .map_err(abort)?;

            let (written, deleted) = attributes
                .iter()
                .partition::<Vec<_>, _>(|(_, value)| !value.is_empty());
            report.sections.push(SectionCommit {
                section: (*section).to_string(),
                written: written.into_iter().map(|(k, _)| k.clone()).collect(),
                deleted: deleted.into_iter().map(|(k, _)| k.clone()).collect(),
                attempts: attempts.load(Ordering::SeqCst),
            });
        }

        Ok(report)
    }

    /// Drop written sections from the session. Skipped sections were never
    /// written, so they keep their values.
    async fn clear_committed(&self, session: &SessionStore, report: &mut CommitReport) {
        for commit in &report.sections {
            if let Err(e) = session.clear(&commit.section).await {
                warn!(
                    order_id = %report.order_id,
                    section = %commit.section,
                    "Failed to clear committed section: {}",
                    e
                );
                report.uncleared.push(commit.section.clone());
            }
        }
    }

    /// Write every attribute of a section; empty values delete the attribute
    async fn write_attributes(
        &self,
        order_id: &str,
        attributes: &[(String, FieldValue)],
    ) -> Result<(), PersistenceError> {
        for (key, value) in attributes {
            if value.is_empty() {
                self.store.delete(order_id, key).await?;
            } else {
                self.store.set(order_id, key, value.clone()).await?;
            }
        }
        Ok(())
    }

    /// Load an order for display after checkout
    pub async fn load(&self, order_id: &str) -> Result<OrderRecord, PersistenceError> {
        self.store.record(order_id).await
    }

    /// A section's values as stored on the order
    pub async fn load_section(
        &self,
        order_id: &str,
        section: &str,
        settings: &Settings,
    ) -> Result<(SectionSchema, SectionValues), PersistenceError> {
        let schema = self.provider.resolve(section, settings);
        let record = self.store.record(order_id).await?;
        let values = record.section_values(&schema);
        Ok((schema, values))
    }
}

/// Attribute writes for a section, applying order-save rules: a field paired
/// with an empty partner is stored as empty.
///
/// The session deliberately keeps such dangling values; only the order drops
/// them.
pub fn order_attributes(schema: &SectionSchema, values: &SectionValues) -> Vec<(String, FieldValue)> {
    schema
        .fields
        .iter()
        .map(|field| {
            let mut value = values
                .get(&field.id)
                .cloned()
                .unwrap_or_else(|| field.kind.empty_value());

            if let Some(partner) = &field.paired_with {
                let partner_empty = values.get(partner).map_or(true, FieldValue::is_empty);
                if partner_empty {
                    value = FieldValue::Null;
                }
            }

            (attribute_key(&schema.key, &field.id), value)
        })
        .collect()
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{SessionBackend, SessionRecord};
use crate::error::{PersistenceError, StoreKind};
use crate::schema::SectionValues;

/// In-process session backend.
///
/// Supports failure injection so callers can exercise retry paths.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionBackend {
    sessions: Arc<Mutex<HashMap<String, SessionRecord>>>,
    /// Number of upcoming writes that fail with a transient error
    failing_writes: Arc<Mutex<usize>>,
    /// Every write attempt, successful or not
    write_attempts: Arc<Mutex<usize>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` section writes fail transiently
    pub fn fail_next_writes(&self, count: usize) {
        *self.failing_writes.lock().unwrap_or_else(|e| e.into_inner()) = count;
    }

    /// Number of write attempts seen so far
    pub fn write_attempts(&self) -> usize {
        *self.write_attempts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_failure(&self) -> Option<PersistenceError> {
        *self.write_attempts.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        let mut failing = self.failing_writes.lock().unwrap_or_else(|e| e.into_inner());
        if *failing > 0 {
            *failing -= 1;
            Some(PersistenceError::transient(
                StoreKind::Session,
                "injected write failure",
            ))
        } else {
            None
        }
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn load(&self, session_id: &str) -> Result<SessionRecord, PersistenceError> {
        Ok(self.sessions().get(session_id).cloned().unwrap_or_default())
    }

    async fn write_section(
        &self,
        session_id: &str,
        section: &str,
        values: SectionValues,
    ) -> Result<(), PersistenceError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.sessions()
            .entry(session_id.to_string())
            .or_default()
            .set_section(section, values);
        Ok(())
    }

    async fn clear_section(
        &self,
        session_id: &str,
        section: &str,
    ) -> Result<(), PersistenceError> {
        if let Some(record) = self.sessions().get_mut(session_id) {
            record.remove_section(section);
        }
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), PersistenceError> {
        self.sessions().remove(session_id);
        Ok(())
    }
}

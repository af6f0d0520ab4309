use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{OrderRecord, OrderStore};
use crate::error::{PersistenceError, StoreKind};
use crate::schema::FieldValue;

/// In-process order store with failure and latency injection
#[derive(Debug, Default, Clone)]
pub struct MemoryOrderStore {
    orders: Arc<Mutex<HashMap<String, OrderRecord>>>,
    /// Upcoming set/delete calls that fail transiently
    failing_writes: Arc<Mutex<usize>>,
    /// When set, every write fails permanently
    read_only: Arc<Mutex<bool>>,
    /// Artificial latency added to each write
    write_delay: Arc<Mutex<Option<Duration>>>,
    /// Record of write operations: (operation, key)
    write_log: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with a transient error
    pub fn fail_next_writes(&self, count: usize) {
        *lock(&self.failing_writes) = count;
    }

    /// Make every write fail with a permanent error
    pub fn set_read_only(&self, read_only: bool) {
        *lock(&self.read_only) = read_only;
    }

    /// Delay every write by `delay`
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *lock(&self.write_delay) = delay;
    }

    /// Operations attempted so far, including failed ones
    pub fn write_log(&self) -> Vec<(String, String)> {
        lock(&self.write_log).clone()
    }

    async fn before_write(&self, operation: &str, key: &str) -> Result<(), PersistenceError> {
        lock(&self.write_log).push((operation.to_string(), key.to_string()));

        let delay = *lock(&self.write_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *lock(&self.read_only) {
            return Err(PersistenceError::permanent(StoreKind::Order, "store is read-only"));
        }

        let mut failing = lock(&self.failing_writes);
        if *failing > 0 {
            *failing -= 1;
            return Err(PersistenceError::transient(
                StoreKind::Order,
                "injected write failure",
            ));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, order_id: &str, key: &str) -> Result<Option<FieldValue>, PersistenceError> {
        Ok(lock(&self.orders)
            .get(order_id)
            .and_then(|record| record.attributes.get(key).cloned()))
    }

    async fn set(
        &self,
        order_id: &str,
        key: &str,
        value: FieldValue,
    ) -> Result<(), PersistenceError> {
        self.before_write("set", key).await?;
        lock(&self.orders)
            .entry(order_id.to_string())
            .or_insert_with(|| OrderRecord::new(order_id))
            .attributes
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, order_id: &str, key: &str) -> Result<(), PersistenceError> {
        self.before_write("delete", key).await?;
        if let Some(record) = lock(&self.orders).get_mut(order_id) {
            record.attributes.remove(key);
        }
        Ok(())
    }

    async fn record(&self, order_id: &str) -> Result<OrderRecord, PersistenceError> {
        Ok(lock(&self.orders)
            .get(order_id)
            .cloned()
            .unwrap_or_else(|| OrderRecord::new(order_id)))
    }
}

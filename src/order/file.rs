use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{OrderRecord, OrderStore};
use crate::error::{PersistenceError, StoreKind};
use crate::schema::FieldValue;

/// Order store keeping one JSON document per order under a directory
#[derive(Debug)]
pub struct FileOrderStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileOrderStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, order_id: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !order_id.is_empty()
            && order_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::permanent(
                StoreKind::Order,
                format!("invalid order id '{}'", order_id),
            ));
        }
        Ok(self.dir.join(format!("{}.json", order_id)))
    }

    async fn read(&self, order_id: &str, path: &Path) -> Result<OrderRecord, PersistenceError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| {
                PersistenceError::Corrupt {
                    store: StoreKind::Order,
                    source,
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OrderRecord::new(order_id)),
            Err(source) => Err(PersistenceError::Io {
                store: StoreKind::Order,
                source,
            }),
        }
    }

    async fn write(&self, path: &Path, record: &OrderRecord) -> Result<(), PersistenceError> {
        let io = |source| PersistenceError::Io {
            store: StoreKind::Order,
            source,
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(io)?;
        let contents = serde_json::to_string_pretty(record).map_err(|source| {
            PersistenceError::Corrupt {
                store: StoreKind::Order,
                source,
            }
        })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(io)?;
        tokio::fs::rename(&tmp, path).await.map_err(io)
    }
}

#[async_trait]
impl OrderStore for FileOrderStore {
    async fn get(&self, order_id: &str, key: &str) -> Result<Option<FieldValue>, PersistenceError> {
        let path = self.path_for(order_id)?;
        let record = self.read(order_id, &path).await?;
        Ok(record.attributes.get(key).cloned())
    }

    async fn set(
        &self,
        order_id: &str,
        key: &str,
        value: FieldValue,
    ) -> Result<(), PersistenceError> {
        let path = self.path_for(order_id)?;
        let _guard = self.lock.lock().await;
        let mut record = self.read(order_id, &path).await?;
        record.attributes.insert(key.to_string(), value);
        self.write(&path, &record).await
    }

    async fn delete(&self, order_id: &str, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(order_id)?;
        let _guard = self.lock.lock().await;
        let mut record = self.read(order_id, &path).await?;
        if record.attributes.remove(key).is_some() {
            self.write(&path, &record).await?;
        }
        Ok(())
    }

    async fn record(&self, order_id: &str) -> Result<OrderRecord, PersistenceError> {
        let path = self.path_for(order_id)?;
        self.read(order_id, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip_through_disk() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileOrderStore::new(temp_dir.path().join("orders"));

        store
            .set("1001", "gift_options.gift_message", FieldValue::text("Hi"))
            .await
            .unwrap();

        let reopened = FileOrderStore::new(temp_dir.path().join("orders"));
        let record = reopened.record("1001").await.unwrap();
        assert_eq!(record.order_id, "1001");
        assert_eq!(
            record.get("gift_options", "gift_message"),
            Some(&FieldValue::text("Hi"))
        );
    }

    #[tokio::test]
    async fn test_delete_missing_attribute_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileOrderStore::new(temp_dir.path());
        store.delete("1002", "gift_options.gift_from").await.unwrap();
        assert!(store.record("1002").await.unwrap().attributes.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_order_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileOrderStore::new(temp_dir.path());
        assert!(store.get("a/b", "k").await.is_err());
    }
}

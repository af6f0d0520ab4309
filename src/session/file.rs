use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{SessionBackend, SessionRecord};
use crate::error::{PersistenceError, StoreKind};
use crate::schema::SectionValues;

/// Session backend keeping one JSON document per session under a directory
#[derive(Debug)]
pub struct FileSessionBackend {
    dir: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileSessionBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::permanent(
                StoreKind::Session,
                format!("invalid session id '{}'", session_id),
            ));
        }
        Ok(self.dir.join(format!("{}.json", session_id)))
    }

    async fn read(&self, path: &Path) -> Result<SessionRecord, PersistenceError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| {
                PersistenceError::Corrupt {
                    store: StoreKind::Session,
                    source,
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionRecord::default()),
            Err(source) => Err(PersistenceError::Io {
                store: StoreKind::Session,
                source,
            }),
        }
    }

    /// Write via a temp file and rename so readers never see a torn document
    async fn write(&self, path: &Path, record: &SessionRecord) -> Result<(), PersistenceError> {
        let io = |source| PersistenceError::Io {
            store: StoreKind::Session,
            source,
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(io)?;

        let contents = serde_json::to_string_pretty(record).map_err(|source| {
            PersistenceError::Corrupt {
                store: StoreKind::Session,
                source,
            }
        })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(io)?;
        tokio::fs::rename(&tmp, path).await.map_err(io)
    }
}

#[async_trait]
impl SessionBackend for FileSessionBackend {
    async fn load(&self, session_id: &str) -> Result<SessionRecord, PersistenceError> {
        let path = self.path_for(session_id)?;
        self.read(&path).await
    }

    async fn write_section(
        &self,
        session_id: &str,
        section: &str,
        values: SectionValues,
    ) -> Result<(), PersistenceError> {
        let path = self.path_for(session_id)?;
        let _guard = self.lock.lock().await;
        let mut record = self.read(&path).await?;
        record.set_section(section, values);
        self.write(&path, &record).await
    }

    async fn clear_section(
        &self,
        session_id: &str,
        section: &str,
    ) -> Result<(), PersistenceError> {
        let path = self.path_for(session_id)?;
        let _guard = self.lock.lock().await;
        let mut record = self.read(&path).await?;
        if record.remove_section(section).is_some() {
            self.write(&path, &record).await?;
        }
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(session_id)?;
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Io {
                store: StoreKind::Session,
                source,
            }),
        }
    }
}

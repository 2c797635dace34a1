use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt session catalog {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A persisted conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// Every stored session keyed by id. This is the unit written to disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCatalog {
    #[serde(default)]
    pub sessions: HashMap<String, Session>,
}

impl SessionCatalog {
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Most recently updated first; ties broken by id.
    pub fn sorted(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        sessions
    }
}

/// JSON-file session store. Every save rewrites the whole catalog, so only one
/// process should use a given file at a time.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole catalog. A missing file is an empty catalog.
    pub fn list_all(&self) -> Result<SessionCatalog, StoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionCatalog::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    operation: "read",
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if data.trim().is_empty() {
            return Ok(SessionCatalog::default());
        }
        serde_json::from_str(&data).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    pub fn load(&self, id: &str) -> Result<Option<Vec<Message>>, StoreError> {
        let mut catalog = self.list_all()?;
        Ok(catalog.sessions.remove(id).map(|s| s.messages))
    }

    /// Upsert `id` with a full snapshot of `messages`, stamped now.
    pub fn save(&self, id: &str, messages: &[Message]) -> Result<(), StoreError> {
        let mut catalog = self.list_all()?;
        catalog.sessions.insert(
            id.to_string(),
            Session {
                id: id.to_string(),
                timestamp: Utc::now(),
                messages: messages.to_vec(),
            },
        );
        self.write(&catalog)?;
        tracing::debug!(session = id, messages = messages.len(), "session saved");
        Ok(())
    }

    fn write(&self, catalog: &SessionCatalog) -> Result<(), StoreError> {
        let io_err = |operation: &'static str, source: std::io::Error| StoreError::Io {
            operation,
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err("create directory for", e))?;

        let json = serde_json::to_vec_pretty(catalog).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_err("write", e))?;
        tmp.write_all(&json).map_err(|e| io_err("write", e))?;
        tmp.persist(&self.path)
            .map_err(|e| io_err("replace", e.error))?;
        Ok(())
    }
}

/// Session id derived from the local start time.
pub fn session_id_now() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

//! Session key-value store
//!
//! One store per UI session. Values are JSON so anything serde can handle
//! fits; the store can optionally mirror itself to a file so a CLI can carry
//! a session across invocations.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Persisted contents of a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionData {
    #[serde(default)]
    values: BTreeMap<String, Value>,
    /// Render generation; bumped every time a render starts
    #[serde(default)]
    generation: u64,
}

/// Session store shared by everything rendering for one session
///
/// Cloning is cheap and yields a handle to the same session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    /// Backing file; empty for in-memory sessions
    path: PathBuf,
    data: Arc<RwLock<SessionData>>,
}

impl SessionStore {
    /// Create an in-memory session (discarded when dropped)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            data: Arc::new(RwLock::new(SessionData::default())),
        }
    }

    /// Open a file-backed session, loading existing contents if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                Error::session(format!("Failed to read session file: {e}"))
            })?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::session(format!("Failed to parse session file: {e}")))?
        } else {
            SessionData::default()
        };

        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
        })
    }

    /// Whether this session lives only in memory
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// Backing file path (empty for in-memory sessions)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a raw value
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.data.read().await.values.get(key).cloned()
    }

    /// Get a value and deserialize it
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::session(format!("Session key '{key}' has unexpected shape: {e}"))),
        }
    }

    /// Check whether a key is set
    pub async fn contains(&self, key: &str) -> bool {
        self.data.read().await.values.contains_key(key)
    }

    /// Set a value
    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.data.write().await.values.insert(key.into(), value);
        self.save().await
    }

    /// Remove a value, returning the previous one
    pub async fn remove(&self, key: &str) -> Result<Option<Value>> {
        let previous = self.data.write().await.values.remove(key);
        self.save().await?;
        Ok(previous)
    }

    /// Keys currently set
    pub async fn keys(&self) -> Vec<String> {
        self.data.read().await.values.keys().cloned().collect()
    }

    /// Drop every value
    pub async fn clear(&self) -> Result<()> {
        self.data.write().await.values.clear();
        self.save().await
    }

    /// Start a render and return its generation
    ///
    /// Any render that started earlier becomes stale: its
    /// [`commit_if_current`](Self::commit_if_current) calls are rejected.
    pub async fn begin_render(&self) -> u64 {
        let mut data = self.data.write().await;
        data.generation += 1;
        data.generation
    }

    /// Current render generation
    pub async fn generation(&self) -> u64 {
        self.data.read().await.generation
    }

    /// Apply a batch of updates if no newer render has started
    ///
    /// `None` removes the key. Returns `false` (and changes nothing) when the
    /// render that produced the updates is stale.
    pub async fn commit_if_current(
        &self,
        generation: u64,
        updates: Vec<(String, Option<Value>)>,
    ) -> Result<bool> {
        {
            let mut data = self.data.write().await;
            if data.generation != generation {
                debug!(
                    render = generation,
                    current = data.generation,
                    "Discarding updates from stale render"
                );
                return Ok(false);
            }
            for (key, value) in updates {
                match value {
                    Some(value) => {
                        data.values.insert(key, value);
                    }
                    None => {
                        data.values.remove(&key);
                    }
                }
            }
        }

        self.save().await?;
        Ok(true)
    }

    /// Write the session to its backing file (no-op in memory)
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = {
            let data = self.data.read().await;
            serde_json::to_string_pretty(&*data)
                .map_err(|e| Error::session(format!("Failed to serialize session: {e}")))?
        };

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::session(format!("Failed to write session file: {e}")))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::session(format!("Failed to rename session file: {e}")))?;

        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

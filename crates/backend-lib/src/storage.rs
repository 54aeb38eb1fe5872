// ============================
// sessiongate-backend/src/storage.rs
// ============================
//! Key-value storage with per-key time-to-live.
//!
//! Session records are kept behind [`KvStore`]. Two backends ship with the
//! crate: an in-process map for single-node deployments and tests, and a
//! flat-file store that survives restarts.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::{fs as tokio_fs, task::JoinHandle};
use uuid::Uuid;

use crate::config::{StoreBackend, StoreSettings};
use crate::error::AppError;
use crate::metrics::KV_SWEPT;

/// Trait for key-value backends with per-key expiry
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value. Keys past their TTL read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Write a value that the backend drops after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Build the backend selected in configuration
pub fn from_settings(settings: &StoreSettings) -> Result<Arc<dyn KvStore>, AppError> {
    match settings.backend {
        StoreBackend::Memory => {
            let store = Arc::new(MemoryKvStore::new());
            if tokio::runtime::Handle::try_current().is_ok() {
                store.spawn_sweeper(Duration::from_secs(settings.sweep_interval_secs));
            }
            Ok(store)
        },
        StoreBackend::File => Ok(Arc::new(FlatFileKvStore::new(&settings.path)?)),
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    deadline: Instant,
}

/// In-process key-value store
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry whose deadline has passed, returning how many went
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.deadline > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of live and not-yet-swept entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periodically purge expired entries on the current runtime
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.purge_expired();
                if removed > 0 {
                    counter!(KV_SWEPT).increment(removed as u64);
                    tracing::debug!(removed, "swept expired keys");
                }
            }
        })
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if entry.deadline > now => return Ok(Some(entry.value.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        // Lazily evict; the read guard above has been released.
        self.entries.remove_if(key, |_, entry| entry.deadline <= now);
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let deadline = Instant::now().checked_add(ttl).ok_or_else(|| {
            AppError::InvalidInput(format!("ttl of {}s is out of range", ttl.as_secs()))
        })?;
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                deadline,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// On-disk envelope for a single key
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEnvelope {
    value: String,
    expires_at_ms: u64,
}

/// Flat-file implementation of the [`KvStore`] trait.
///
/// Each key maps to `<root>/<hex(key)>.json`. Expiry is enforced on read.
#[derive(Debug, Clone)]
pub struct FlatFileKvStore {
    root: PathBuf,
}

impl FlatFileKvStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", hex::encode(key.as_bytes())))
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl KvStore for FlatFileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key);
        let content = match tokio_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AppError::Store(err.to_string())),
        };

        let envelope: FileEnvelope = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "dropping unreadable key file");
                self.delete(key).await?;
                return Ok(None);
            },
        };

        if envelope.expires_at_ms <= unix_millis() {
            self.delete(key).await?;
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let envelope = FileEnvelope {
            value: value.to_string(),
            expires_at_ms: unix_millis()
                .saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
        };
        let json = serde_json::to_string(&envelope)?;

        // Write then rename so readers never observe a half-written file.
        // Each writer gets its own temp file; the last rename wins.
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        if let Err(err) = tokio_fs::write(&tmp, json).await {
            let _ = tokio_fs::remove_file(&tmp).await;
            return Err(AppError::Store(err.to_string()));
        }
        if let Err(err) = tokio_fs::rename(&tmp, &path).await {
            let _ = tokio_fs::remove_file(&tmp).await;
            return Err(AppError::Store(err.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        match tokio_fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Store(err.to_string())),
        }
    }
}

//! File-backed account directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::{AuthError, UserRecord};

use super::UserStore;

/// In-memory directory of accounts keyed by email, durable to a single
/// JSON-array file.
///
/// The file is the full snapshot: every mutation rewrites it from the
/// current in-memory map (no journal, no incremental append). One async
/// mutex serializes all read-modify-write sequences, including the
/// rewrite, so concurrent connections cannot lose updates or tear the
/// file.
///
/// Durability is best-effort by design: a failed rewrite is logged and
/// the in-memory mutation stands, so callers still observe success.
pub struct FileStore {
    inner: Mutex<HashMap<String, UserRecord>>,
    path: Option<PathBuf>,
}

impl FileStore {
    /// Open the directory backed by `path`.
    ///
    /// A missing file means no existing users. A present file is read
    /// whole, every record is expiry-normalized, and the file is
    /// rewritten once so freshly-downgraded records are not reloaded as
    /// premium next time. Unreadable or unparsable content is logged and
    /// treated as an empty directory rather than aborting startup.
    pub async fn open(path: impl AsRef<Path>) -> Result<FileStore, AuthError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        let mut users = HashMap::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<UserRecord>>(&content) {
                Ok(records) => {
                    let now = Utc::now();
                    for mut record in records {
                        record.downgrade_if_expired(now);
                        users.insert(record.email.clone(), record);
                    }
                    info!(path = %path.display(), count = users.len(), "users loaded");
                }
                Err(err) => {
                    error!(path = %path.display(), error = %err, "users file unparsable, starting empty");
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "users file does not exist yet");
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "users file unreadable, starting empty");
            }
        }

        let store = FileStore {
            inner: Mutex::new(users),
            path: Some(path),
        };
        // Normalize on disk once after loading.
        {
            let guard = store.inner.lock().await;
            store.save(&guard).await;
        }
        Ok(store)
    }

    /// A directory with no backing file. Mutations are memory-only; used
    /// by tests and embedders that handle durability themselves.
    pub fn in_memory() -> FileStore {
        FileStore {
            inner: Mutex::new(HashMap::new()),
            path: None,
        }
    }

    /// Rewrite the whole snapshot. Failures are logged, not surfaced.
    async fn save(&self, users: &HashMap<String, UserRecord>) {
        let Some(path) = &self.path else {
            return;
        };
        let records: Vec<&UserRecord> = users.values().collect();
        let json = match serde_json::to_vec_pretty(&records) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "failed to serialize users");
                return;
            }
        };
        if let Err(err) = tokio::fs::write(path, json).await {
            error!(path = %path.display(), error = %err, "failed to rewrite users file");
        }
    }
}

#[async_trait]
impl UserStore for FileStore {
    async fn lookup(&self, email: &str) -> Option<UserRecord> {
        let mut users = self.inner.lock().await;
        let record = users.get_mut(email)?;
        // In-memory normalization only; lookup never rewrites the file.
        record.downgrade_if_expired(Utc::now());
        Some(record.clone())
    }

    async fn insert(&self, record: UserRecord) -> bool {
        let mut users = self.inner.lock().await;
        if users.contains_key(&record.email) {
            return false;
        }
        users.insert(record.email.clone(), record);
        self.save(&users).await;
        true
    }

    async fn update<F, R>(&self, email: &str, apply: F) -> Option<R>
    where
        F: FnOnce(&mut UserRecord) -> R + Send,
        R: Send,
    {
        let mut users = self.inner.lock().await;
        let record = users.get_mut(email)?;
        record.downgrade_if_expired(Utc::now());
        let result = apply(record);
        self.save(&users).await;
        Some(result)
    }

    async fn remove(&self, email: &str) -> bool {
        let mut users = self.inner.lock().await;
        if users.remove(email).is_none() {
            return false;
        }
        self.save(&users).await;
        true
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

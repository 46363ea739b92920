//! JSON document fallback for pending actions.
//!
//! Every call re-reads the document from disk, so separate handles on the
//! same file (a server and a `prune` run, say) observe each other's writes.
//! Mutations rewrite the whole document through a temp file renamed over
//! the target, so a crash never leaves a half-written file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tempfile::NamedTempFile;

use crate::models::pending::{ActionStatus, PendingAction};
use crate::{AppError, Result};

use super::{released_status, PendingActionStore, StoreFuture};

type Document = BTreeMap<String, PendingAction>;

/// File-backed store holding every action in a single JSON object keyed by token.
pub struct JsonPendingStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonPendingStore {
    /// Open the document at `path`, starting empty when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created or the
    /// existing document cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Io(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        load(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, doc: &Document) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, doc)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| AppError::Io(format!("failed to replace {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Load the current document, apply `f` and write the result back.
    fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> T) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::Io("json store mutex poisoned".to_owned()))?;
        let mut doc = load(&self.path)?;
        let out = f(&mut doc);
        self.persist(&doc)?;
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::Io("json store mutex poisoned".to_owned()))?;
        Ok(f(&load(&self.path)?))
    }
}

/// Read the document at `path`; a missing or blank file is an empty document.
fn load(path: &Path) -> Result<Document> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(e) => {
            return Err(AppError::Io(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };
    if raw.trim().is_empty() {
        return Ok(Document::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

impl PendingActionStore for JsonPendingStore {
    fn backend(&self) -> &'static str {
        "json"
    }

    fn store(
        &self,
        action: PendingAction,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, PendingAction> {
        Box::pin(async move {
            let stored = PendingAction {
                created_at: now,
                expires_at: now + ttl,
                status: ActionStatus::Pending,
                attempts: 0,
                ..action
            };
            let record = stored.clone();
            self.mutate(move |doc| {
                doc.insert(record.token.clone(), record);
            })?;
            Ok(stored)
        })
    }

    fn fetch_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Option<PendingAction>> {
        let token = token.to_owned();
        Box::pin(async move {
            self.read(|doc| doc.get(&token).filter(|a| a.is_active(now)).cloned())
        })
    }

    fn transition(&self, token: &str, status: ActionStatus) -> StoreFuture<'_, ()> {
        let token = token.to_owned();
        Box::pin(async move {
            self.mutate(|doc| {
                if let Some(action) = doc.get_mut(&token) {
                    action.status = status;
                }
            })
        })
    }

    fn claim(&self, token: &str, now: DateTime<Utc>) -> StoreFuture<'_, Option<PendingAction>> {
        let token = token.to_owned();
        Box::pin(async move {
            let claimable = self.read(|doc| doc.get(&token).is_some_and(|a| a.is_active(now)))?;
            if !claimable {
                return Ok(None);
            }
            // Re-checked against a fresh load under the lock so only one caller wins.
            self.mutate(|doc| {
                let action = doc.get_mut(&token).filter(|a| a.is_active(now))?;
                action.status = ActionStatus::InProgress;
                action.attempts += 1;
                Some(action.clone())
            })
        })
    }

    fn release(&self, token: &str, max_attempts: u32) -> StoreFuture<'_, ActionStatus> {
        let token = token.to_owned();
        Box::pin(async move {
            let released = self.mutate(|doc| {
                let action = doc
                    .get_mut(&token)
                    .filter(|a| a.status == ActionStatus::InProgress)?;
                action.status = released_status(action.attempts, max_attempts);
                Some(action.status)
            })?;
            released.ok_or_else(|| AppError::NotFound(format!("no claimed action {token}")))
        })
    }

    fn lookup(&self, token: &str) -> StoreFuture<'_, Option<PendingAction>> {
        let token = token.to_owned();
        Box::pin(async move { self.read(|doc| doc.get(&token).cloned()) })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let removed = self.mutate(|doc| {
                let before = doc.len();
                doc.retain(|_, a| a.expires_at > now);
                before - doc.len()
            })?;
            Ok(u64::try_from(removed).unwrap_or(u64::MAX))
        })
    }
}

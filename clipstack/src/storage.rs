//! JSON key-value persistence for history and settings
//!
//! Everything lives in one JSON document on disk: a flat map of settings
//! keys plus the history array under [`HISTORY_KEY`]. Writes go through a
//! debounced autosave so rapid captures coalesce into one disk write.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::ClipboardItem;

/// Map key holding the serialized history array.
pub const HISTORY_KEY: &str = "ClipboardHistory";

/// Quiet period before a pending save hits the disk.
pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Backup document version written by `export`.
pub const BACKUP_VERSION: &str = "1.0";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(serde_json::Error),
    #[error("decode error: {0}")]
    Decode(serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Exported backup document: history plus the settings map, so a restore
/// brings back both.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub items: Vec<ClipboardItem>,
    pub settings: Map<String, Value>,
}

/// Flat key-value store backed by one JSON file.
///
/// The in-memory map is the source of truth between flushes; a corrupt or
/// missing file on open degrades to an empty map rather than failing.
pub struct SettingsStore {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl SettingsStore {
    /// Open the store, reading the existing document if present. A file
    /// that fails to parse is logged and treated as empty; the next flush
    /// overwrites it.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "settings file unreadable, starting empty");
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_u64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).and_then(|v| {
            v.as_array().map(|arr| {
                arr.iter()
                    .filter_map(|e| e.as_str().map(str::to_string))
                    .collect()
            })
        })
    }

    /// Load the persisted history. Missing key or a decode failure both
    /// yield an empty history; a failed decode is logged, never fatal.
    pub fn load_history(&self) -> Vec<ClipboardItem> {
        let Some(raw) = self.get(HISTORY_KEY) else {
            return Vec::new();
        };
        match serde_json::from_value::<Vec<ClipboardItem>>(raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "stored history failed to decode, starting empty");
                Vec::new()
            }
        }
    }

    /// Stage the history for the next flush. Encoding failure skips the
    /// update and keeps the previous on-disk copy; the in-memory history is
    /// untouched either way.
    pub fn save_history(&self, items: &[ClipboardItem]) {
        match serde_json::to_value(items) {
            Ok(value) => {
                self.set(HISTORY_KEY, value);
            }
            Err(e) => {
                warn!(error = %e, "history failed to encode, keeping previous snapshot");
            }
        }
    }

    /// Write the whole map to disk.
    pub fn flush(&self) -> StorageResult<()> {
        let snapshot = self.values.read().clone();
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(StorageError::Encode)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, bytes)?;
        debug!(path = %self.path.display(), "settings flushed");
        Ok(())
    }

    /// Snapshot of every key except the history array, for backup export.
    pub fn settings_snapshot(&self) -> Map<String, Value> {
        let mut snapshot = self.values.read().clone();
        snapshot.remove(HISTORY_KEY);
        snapshot
    }

    /// Merge settings keys from an imported backup. The history array is
    /// handled separately by the caller.
    pub fn merge_settings(&self, settings: Map<String, Value>) {
        let mut values = self.values.write();
        for (key, value) in settings {
            if key != HISTORY_KEY {
                values.insert(key, value);
            }
        }
    }
}

/// Serialize a backup document to a file.
pub fn export_backup(
    path: &Path,
    items: &[ClipboardItem],
    settings: Map<String, Value>,
) -> StorageResult<()> {
    let backup = Backup {
        version: BACKUP_VERSION.to_string(),
        export_date: Utc::now(),
        items: items.to_vec(),
        settings,
    };
    let bytes = serde_json::to_vec_pretty(&backup).map_err(StorageError::Encode)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Read a backup document back from a file.
pub fn import_backup(path: &Path) -> StorageResult<Backup> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(StorageError::Decode)
}

/// Debounced autosave loop. Each signal arms a timer; further signals
/// inside the quiet period are drained so a capture burst produces a single
/// flush. Cancellation performs one final flush if a save is pending.
pub fn spawn_autosave(
    store: Arc<SettingsStore>,
    mut rx: mpsc::Receiver<()>,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                signal = rx.recv() => {
                    if signal.is_none() {
                        return;
                    }
                }
            }

            // Quiet period. New signals during the wait restart nothing;
            // they are drained below and ride the same flush.
            tokio::select! {
                _ = token.cancelled() => {
                    if let Err(e) = store.flush() {
                        warn!(error = %e, "final settings flush failed");
                    }
                    return;
                }
                _ = tokio::time::sleep(AUTOSAVE_DEBOUNCE) => {}
            }
            while rx.try_recv().is_ok() {}

            if let Err(e) = store.flush() {
                warn!(error = %e, "autosave flush failed");
            }
        }
    })
}

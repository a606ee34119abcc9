//! # File I/O Module
//!
//! Persists the referential and the project state as two independent JSON
//! blobs in a store directory:
//!
//! - **Stable keys**: `estimator_referential_v1.json`, `estimator_state_v1.json`
//! - **Atomic saves**: write to `.tmp`, fsync, rename
//! - **Store lock**: an OS-level lock (fs2) on `.store.lock` while writing, so
//!   two processes sharing a directory do not interleave writes
//! - **Forgiving loads**: a missing blob is not an error; an unreadable or
//!   unparsable one is logged and treated as missing. Loaded blobs always go
//!   through normalization.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cost_core::file_io::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::new(".estimator"));
//! let referential = store.load_referential();
//! let mut state = store.load_state(&referential);
//! state.initialize_lines(&referential);
//!
//! store.save_state(&state)?;
//! # Ok::<(), cost_core::errors::CostError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CostError, CostResult};
use crate::referential::{normalize_referential, Referential};
use crate::state::{normalize_state, ProjectState};

/// Storage key of the referential blob
pub const REFERENTIAL_KEY: &str = "estimator_referential_v1";

/// Storage key of the project state blob
pub const STATE_KEY: &str = "estimator_state_v1";

const LOCK_FILE_NAME: &str = ".store.lock";

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

impl StoreConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StoreConfig { dir: dir.into() }
    }

    /// Path of the blob stored under `key`
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Path of the lock file
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }
}

/// Lock file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that holds the lock
    pub pid: u32,
    /// When the lock was acquired
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    /// Lock info for the current process
    pub fn current() -> Self {
        LockInfo {
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }
}

/// Exclusive store lock, released when dropped.
pub struct StoreLock {
    /// The underlying file handle (keeps OS lock)
    _lock_file: File,
    /// Lock metadata
    pub info: LockInfo,
}

impl StoreLock {
    /// Acquire the store lock without blocking.
    ///
    /// # Returns
    ///
    /// * `Ok(StoreLock)` - Lock acquired
    /// * `Err(CostError::StoreLocked)` - Another process holds the lock
    pub fn acquire(config: &StoreConfig) -> CostResult<Self> {
        let lock_path = config.lock_path();
        let mut lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CostError::file_error("open lock", lock_path.display().to_string(), e.to_string()))?;

        if lock_file.try_lock_exclusive().is_err() {
            let holder = read_lock_info(&lock_path);
            return Err(CostError::StoreLocked {
                path: config.dir.display().to_string(),
                pid: holder.as_ref().map_or(0, |info| info.pid),
                locked_at: holder
                    .map(|info| info.locked_at.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }

        let info = LockInfo::current();
        let lock_json = serde_json::to_string_pretty(&info)?;
        let write_err =
            |e: std::io::Error| CostError::file_error("write lock", lock_path.display().to_string(), e.to_string());
        lock_file.set_len(0).map_err(write_err)?;
        lock_file.seek(SeekFrom::Start(0)).map_err(write_err)?;
        lock_file.write_all(lock_json.as_bytes()).map_err(write_err)?;

        Ok(StoreLock {
            _lock_file: lock_file,
            info,
        })
    }
}

/// Read lock info left by the current holder, if readable.
fn read_lock_info(lock_path: &Path) -> Option<LockInfo> {
    let mut contents = String::new();
    File::open(lock_path).ok()?.read_to_string(&mut contents).ok()?;
    serde_json::from_str(&contents).ok()
}

/// The two persisted aggregates.
#[derive(Debug, Clone)]
pub struct Store {
    config: StoreConfig,
}

impl Store {
    pub fn open(config: StoreConfig) -> Self {
        Store { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Raw blob under `key`, or `None` when missing or unreadable.
    pub fn read_blob(&self, key: &str) -> Option<Value> {
        let path = self.config.blob_path(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("could not read {}: {}, treating as no saved data", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("invalid JSON in {}: {}, treating as no saved data", path.display(), e);
                None
            }
        }
    }

    /// Whether a state blob is present and readable.
    pub fn has_saved_state(&self) -> bool {
        self.read_blob(STATE_KEY).is_some()
    }

    /// Saved referential, normalized, or the defaults.
    pub fn load_referential(&self) -> Referential {
        match self.read_blob(REFERENTIAL_KEY) {
            Some(value) => normalize_referential(&value),
            None => Referential::default(),
        }
    }

    /// Saved state normalized against `referential`, or its defaults.
    pub fn load_state(&self, referential: &Referential) -> ProjectState {
        let candidate = self.read_blob(STATE_KEY).unwrap_or(Value::Null);
        normalize_state(&candidate, referential)
    }

    pub fn save_referential(&self, referential: &Referential) -> CostResult<()> {
        self.write_blob(REFERENTIAL_KEY, referential)
    }

    pub fn save_state(&self, state: &ProjectState) -> CostResult<()> {
        self.write_blob(STATE_KEY, state)
    }

    /// Remove the saved state only.
    pub fn clear_state(&self) -> CostResult<()> {
        self.remove_blob(STATE_KEY)
    }

    /// Remove both blobs.
    pub fn clear_all(&self) -> CostResult<()> {
        self.remove_blob(STATE_KEY)?;
        self.remove_blob(REFERENTIAL_KEY)
    }

    /// Write a blob atomically under the store lock.
    ///
    /// 1. Serialize to JSON
    /// 2. Write to `<key>.json.tmp` and fsync
    /// 3. Rename over `<key>.json`
    fn write_blob<T: Serialize>(&self, key: &str, value: &T) -> CostResult<()> {
        let json = serde_json::to_string_pretty(value)?;

        fs::create_dir_all(&self.config.dir).map_err(|e| {
            CostError::file_error("create store", self.config.dir.display().to_string(), e.to_string())
        })?;
        let _lock = StoreLock::acquire(&self.config)?;

        let path = self.config.blob_path(key);
        let tmp_path = path.with_extension("json.tmp");

        let mut tmp_file = File::create(&tmp_path).map_err(|e| {
            CostError::file_error("create temp file", tmp_path.display().to_string(), e.to_string())
        })?;
        tmp_file.write_all(json.as_bytes()).map_err(|e| {
            CostError::file_error("write temp file", tmp_path.display().to_string(), e.to_string())
        })?;
        tmp_file.sync_all().map_err(|e| {
            CostError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string())
        })?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CostError::file_error("rename to final", path.display().to_string(), e.to_string())
        })?;

        info!("saved {}", path.display());
        Ok(())
    }

    fn remove_blob(&self, key: &str) -> CostResult<()> {
        let path = self.config.blob_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CostError::file_error("remove", path.display().to_string(), e.to_string())),
        }
    }
}

//! Persistent cache of PyPI metadata.
//!
//! Entries live in memory behind a mutex owned by the cache object, and are
//! written to a single pretty-printed JSON file keyed by package name. Each
//! entry carries its own `fetched_at` stamp and expires after the TTL.
//!
//! # Cache Location
//!
//! `library_details.json` in the application support directory:
//! - Linux: `~/.local/share/venvscan/`
//! - macOS: `~/Library/Application Support/venvscan/`
//! - Windows: `%APPDATA%\venvscan\`
//!
//! # Example
//!
//! ```no_run
//! use venvscan::MetadataCache;
//!
//! let cache = MetadataCache::open_default(24)?;
//! if let Some(info) = cache.get("requests") {
//!     println!("requests {} ({})", info.info.version, info.license());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::model::PypiInfo;
use crate::platform::app_support_dir;

/// Default cache TTL in hours.
const CACHE_TTL_HOURS: u64 = 24;

/// Longest TTL honoured (a century).
const MAX_TTL_HOURS: u64 = 24 * 365 * 100;

/// File name inside the application support directory.
pub const CACHE_FILE_NAME: &str = "library_details.json";

pub struct MetadataCache {
    path: PathBuf,
    ttl: Duration,
    entries: Mutex<HashMap<String, PypiInfo>>,
}

impl MetadataCache {
    /// Opens the cache stored at `path`.
    ///
    /// A missing or empty file gives an empty cache. A file that cannot be
    /// parsed is logged and ignored; it is overwritten on the next save.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut entries = HashMap::new();

        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if !content.trim().is_empty() {
                match serde_json::from_str(&content) {
                    Ok(parsed) => entries = parsed,
                    Err(e) => warn!(path = %path.display(), error = %e, "Ignoring corrupt metadata cache"),
                }
            }
        }

        debug!(path = %path.display(), entries = entries.len(), "Opened metadata cache");
        Ok(Self {
            path,
            ttl: Duration::hours(CACHE_TTL_HOURS as i64),
            entries: Mutex::new(entries),
        })
    }

    /// Opens the cache in the application support directory with the given TTL.
    pub fn open_default(ttl_hours: u64) -> Result<Self> {
        let path = app_support_dir()?.join(CACHE_FILE_NAME);
        Ok(Self::open(path)?.with_ttl_hours(ttl_hours))
    }

    pub fn with_ttl_hours(mut self, hours: u64) -> Self {
        self.ttl = Duration::hours(hours.min(MAX_TTL_HOURS) as i64);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PypiInfo>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_fresh(&self, info: &PypiInfo) -> bool {
        Utc::now().signed_duration_since(info.fetched_at) <= self.ttl
    }

    /// Returns the entry for `name` if it has not expired.
    pub fn get(&self, name: &str) -> Option<PypiInfo> {
        self.lock()
            .get(name)
            .filter(|info| self.is_fresh(info))
            .cloned()
    }

    /// Names from `names` that have no fresh entry, in input order, without repeats.
    pub fn missing<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        let entries = self.lock();
        let mut out: Vec<&str> = Vec::new();
        for name in names {
            let fresh = entries.get(name).is_some_and(|info| self.is_fresh(info));
            if !name.is_empty() && !fresh && !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        out
    }

    pub fn insert(&self, name: impl Into<String>, info: PypiInfo) {
        self.lock().insert(name.into(), info);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes every entry, expired or not, back to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&*self.lock())?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Drops all entries and removes the file.
    pub fn clear(&self) -> Result<()> {
        self.lock().clear();
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

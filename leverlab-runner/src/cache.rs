//! Result caching keyed by RunId.
//!
//! The runner never owns a cache; callers pass one in. Three
//! implementations:
//! - `NoCache`: every lookup misses
//! - `MemoryCache`: in-process map with a time-to-live
//! - `JsonDirCache`: one pretty-printed JSON report per RunId on disk

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::config::RunId;
use crate::export::{export_json, import_json};
use crate::runner::LabReport;

/// Storage for finished reports.
pub trait ResultCache: Send + Sync {
    /// Returns `None` when nothing usable is stored for the RunId.
    fn get(&self, run_id: &RunId) -> Result<Option<LabReport>>;

    fn set(&self, run_id: &RunId, report: &LabReport) -> Result<()>;

    /// Drop the entry for the RunId. Missing entries are not an error.
    fn invalidate(&self, run_id: &RunId) -> Result<()>;
}

/// A cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ResultCache for NoCache {
    fn get(&self, _run_id: &RunId) -> Result<Option<LabReport>> {
        Ok(None)
    }

    fn set(&self, _run_id: &RunId, _report: &LabReport) -> Result<()> {
        Ok(())
    }

    fn invalidate(&self, _run_id: &RunId) -> Result<()> {
        Ok(())
    }
}

/// In-memory cache whose entries expire `ttl` after they were stored.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<RunId, (Instant, LabReport)>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, run_id: &RunId) -> Result<Option<LabReport>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?;
        let expired = match entries.get(run_id) {
            None => return Ok(None),
            Some((stored, _)) => stored.elapsed() > self.ttl,
        };
        if expired {
            entries.remove(run_id);
            return Ok(None);
        }
        Ok(entries.get(run_id).map(|(_, report)| report.clone()))
    }

    fn set(&self, run_id: &RunId, report: &LabReport) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?
            .insert(run_id.clone(), (Instant::now(), report.clone()));
        Ok(())
    }

    fn invalidate(&self, run_id: &RunId) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?
            .remove(run_id);
        Ok(())
    }
}

/// Reports stored as `{run_id}.json` in a directory.
#[derive(Debug, Clone)]
pub struct JsonDirCache {
    cache_dir: PathBuf,
}

impl JsonDirCache {
    /// Creates a new cache with the specified directory.
    ///
    /// The directory will be created if it doesn't exist.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;
        Ok(Self { cache_dir })
    }

    pub fn contains(&self, run_id: &RunId) -> bool {
        self.result_path(run_id).exists()
    }

    /// Removes every cached report.
    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if is_json(&path) {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let count = std::fs::read_dir(&self.cache_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| is_json(&entry.path()))
            .count();
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn result_path(&self, run_id: &RunId) -> PathBuf {
        self.cache_dir.join(format!("{run_id}.json"))
    }
}

fn is_json(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
}

impl ResultCache for JsonDirCache {
    fn get(&self, run_id: &RunId) -> Result<Option<LabReport>> {
        let path = self.result_path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).context("Failed to read cached report")?;
        import_json(&json).map(Some)
    }

    fn set(&self, run_id: &RunId, report: &LabReport) -> Result<()> {
        let json = export_json(report)?;
        std::fs::write(self.result_path(run_id), json).context("Failed to write cached report")
    }

    fn invalidate(&self, run_id: &RunId) -> Result<()> {
        let path = self.result_path(run_id);
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove cached report")?;
        }
        Ok(())
    }
}

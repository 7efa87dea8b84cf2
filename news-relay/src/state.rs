use crate::types::{FlushFailurePolicy, RelayError, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

/// Durable set of every url that was handed to the publisher successfully.
///
/// The set only grows. Each new url is flushed to disk before
/// [`record`](DedupStore::record) returns, by writing a temp file next to the
/// target and renaming it over the old state.
pub struct DedupStore {
    path: PathBuf,
    urls: BTreeSet<String>,
    policy: FlushFailurePolicy,
}

impl DedupStore {
    /// Rebuild the store from `path`. A missing or empty file is an empty store.
    pub fn load(path: impl Into<PathBuf>, policy: FlushFailurePolicy) -> Result<Self> {
        let path = path.into();

        let urls = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeSet::new(),
            Ok(content) => {
                let urls: Vec<String> = serde_json::from_str(&content).map_err(|e| RelayError::Persistence {
                    path: path.clone(),
                    reason: format!("state file is not a JSON list of urls: {}", e),
                })?;
                urls.into_iter().collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state at {}, starting with an empty history", path.display());
                BTreeSet::new()
            }
            Err(e) => {
                return Err(RelayError::Persistence {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        info!("Loaded {} published urls from {}", urls.len(), path.display());
        Ok(Self { path, urls, policy })
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Remember `url` durably.
    ///
    /// Returns `Ok(false)` when it was already recorded (nothing is written).
    /// On a failed flush the url is not durable and an error is returned; with
    /// [`FlushFailurePolicy::Forget`] it is also dropped from memory.
    pub fn record(&mut self, url: &str) -> Result<bool> {
        if !self.urls.insert(url.to_string()) {
            return Ok(false);
        }

        match self.flush() {
            Ok(()) => {
                debug!("Recorded {}", url);
                Ok(true)
            }
            Err(e) => {
                error!("Failed to persist {} to {}: {}", url, self.path.display(), e);
                if self.policy == FlushFailurePolicy::Forget {
                    self.urls.remove(url);
                }
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        self.write_atomic().map_err(|e| RelayError::Persistence {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_atomic(&self) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.urls)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

//! Version counters used to give each run unique resource names.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{Result, WoError};

/// Source of monotonically increasing version numbers.
pub trait VersionSource: Send + Sync {
    /// Advance the counter and return the new value.
    fn next(&self) -> Result<u64>;

    /// Current value without advancing.
    fn current(&self) -> Result<u64>;
}

/// Counter persisted as a single integer in a text file.
///
/// The read-increment-write cycle runs under an exclusive lock on a sidecar
/// `<file>.lock`, so concurrent processes sharing a file do not hand out the
/// same number.
#[derive(Debug, Clone)]
pub struct FileVersionSource {
    path: PathBuf,
}

impl FileVersionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn read_value(&self) -> Result<u64> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        match raw.trim().parse::<u64>() {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "unparseable version file, starting from 0");
                Ok(0)
            }
        }
    }
}

impl VersionSource for FileVersionSource {
    fn next(&self) -> Result<u64> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.read_value().and_then(|current| {
            let next = current
                .checked_add(1)
                .ok_or_else(|| WoError::Invariant("version counter overflow".to_string()))?;
            std::fs::write(&self.path, next.to_string())?;
            Ok(next)
        });

        FileExt::unlock(&lock)?;
        let next = result?;
        debug!(path = %self.path.display(), version = next, "advanced version counter");
        Ok(next)
    }

    fn current(&self) -> Result<u64> {
        self.read_value()
    }
}

/// In-process counter.
#[derive(Debug, Default)]
pub struct MemoryVersionSource {
    value: AtomicU64,
}

impl MemoryVersionSource {
    #[must_use]
    pub const fn starting_at(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }
}

impl VersionSource for MemoryVersionSource {
    fn next(&self) -> Result<u64> {
        Ok(self.value.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn current(&self) -> Result<u64> {
        Ok(self.value.load(Ordering::SeqCst))
    }
}

/// `{prefix}-schema-v{n}`
#[must_use]
pub fn schema_name(prefix: &str, version: u64) -> String {
    format!("{prefix}-schema-v{version}")
}

/// Semantic version label `1.0.{n}` used for schema and template versions.
#[must_use]
pub fn version_label(version: u64) -> String {
    format!("1.0.{version}")
}

/// Reject anything that is not plain `major.minor.patch`.
pub fn validate_semver(label: &str) -> Result<semver::Version> {
    let parsed = semver::Version::parse(label.trim())
        .map_err(|err| WoError::Validation(format!("invalid version {label:?}: {err}")))?;
    if !parsed.pre.is_empty() || !parsed.build.is_empty() {
        return Err(WoError::Validation(format!(
            "invalid version {label:?}: expected major.minor.patch"
        )));
    }
    Ok(parsed)
}

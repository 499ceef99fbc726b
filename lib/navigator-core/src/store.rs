//! Locked JSON cache store shared by process replicas over a common filesystem
//!
//! Readers take a shared advisory lock on the target file. Writers take an exclusive
//! lock on a sidecar `<target>.lock` file, write a temporary file in the same
//! directory, fsync it and rename it over the target. The rename is what keeps readers
//! from ever seeing a partial document; the lock only serializes writers.

use crate::config::CacheConfig;
use crate::error::CacheError;
use fs2::FileExt;
use navigator_api::{CachePayload, Collection, PAYLOAD_VERSION};
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Bounded exponential backoff for lock acquisition
#[derive(Clone, Debug, PartialEq)]
pub struct LockRetryPolicy {
    /// Total number of lock attempts before giving up
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound for a single delay
    pub max_backoff: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl LockRetryPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_attempts: config.lock_attempts.max(1),
            initial_backoff: Duration::from_millis(config.lock_base_delay_ms),
            max_backoff: Duration::from_millis(config.lock_max_delay_ms),
        }
    }

    /// Calculate backoff duration for the given retry count
    pub fn backoff_duration(&self, retry_count: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64;
        let exponential = 2u64.saturating_pow(retry_count);
        let backoff_ms = base
            .saturating_mul(exponential)
            .min(self.max_backoff.as_millis() as u64);
        Duration::from_millis(backoff_ms)
    }

    /// Backoff plus up to 50% jitter so contending replicas drift apart
    fn jittered(&self, retry_count: u32) -> Duration {
        let backoff = self.backoff_duration(retry_count);
        let spread = backoff.as_millis() as u64 / 2;
        if spread == 0 {
            return backoff;
        }
        backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

#[derive(Clone, Copy, Debug)]
enum LockKind {
    Shared,
    Exclusive,
}

/// Held advisory lock, released on drop
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to release lock explicitly: {}", e);
        }
    }
}

/// JSON payload store for one logical collection
pub struct LockedStore<T> {
    path: PathBuf,
    lock_path: PathBuf,
    retry: LockRetryPolicy,
    _collection: PhantomData<fn() -> T>,
}

impl<T: Collection> LockedStore<T> {
    /// Create a store for `path`; the sidecar lock lives next to it
    pub fn new(path: impl Into<PathBuf>, retry: LockRetryPolicy) -> Self {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache".into());
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self {
            path,
            lock_path,
            retry,
            _collection: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the full document under a shared lock
    pub fn read(&self) -> Result<CachePayload<T>, CacheError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::Missing { path: self.path.clone() })
            }
            Err(e) => return Err(self.read_error(e.to_string())),
        };

        let guard = self
            .acquire(file, LockKind::Shared)
            .map_err(|e| self.read_error(e.to_string()))?;

        let mut contents = String::new();
        (&guard.file)
            .read_to_string(&mut contents)
            .map_err(|e| self.read_error(e.to_string()))?;
        drop(guard);

        let payload: CachePayload<T> = serde_json::from_str(&contents)
            .map_err(|e| self.read_error(format!("invalid JSON: {}", e)))?;
        if payload.version > PAYLOAD_VERSION {
            return Err(self.read_error(format!(
                "unsupported payload version {} (max {})",
                payload.version, PAYLOAD_VERSION
            )));
        }

        debug!("Read cache {} ({} clusters)", self.path.display(), payload.stats.total_clusters);
        Ok(payload)
    }

    /// Replace the document atomically while holding the exclusive writer lock
    pub fn write(&self, payload: &CachePayload<T>) -> Result<(), CacheError> {
        let _guard = self.lock_exclusive()?;
        self.write_locked(payload)
    }

    /// Read-modify-write under one exclusive lock acquisition
    ///
    /// A missing document starts from the empty collection. Nothing is written when
    /// `mutate` returns an error.
    pub fn update<R, E, F>(&self, mutate: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<CacheError>,
    {
        let _guard = self.lock_exclusive()?;

        let mut data = match self.read() {
            Ok(payload) => payload.data,
            Err(CacheError::Missing { .. }) => T::default(),
            Err(e) => return Err(e.into()),
        };

        let result = mutate(&mut data)?;
        self.write_locked(&CachePayload::new(data))?;
        Ok(result)
    }

    /// Write an empty document unless one already exists; true when one was created
    pub fn initialize_if_missing(&self) -> Result<bool, CacheError> {
        let _guard = self.lock_exclusive()?;
        if self.path.exists() {
            return Ok(false);
        }
        self.write_locked(&CachePayload::new(T::default()))?;
        Ok(true)
    }

    fn lock_exclusive(&self) -> Result<LockGuard, CacheError> {
        if let Some(parent) = self.lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e.to_string()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| self.write_error(format!("cannot open lock file: {}", e)))?;

        self.acquire(file, LockKind::Exclusive)
            .map_err(|e| self.write_error(e.to_string()))
    }

    fn acquire(&self, file: File, kind: LockKind) -> io::Result<LockGuard> {
        let contended = fs2::lock_contended_error().kind();
        let mut attempt = 0;
        loop {
            let result = match kind {
                LockKind::Shared => FileExt::try_lock_shared(&file),
                LockKind::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            match result {
                Ok(()) => return Ok(LockGuard { file }),
                Err(e) if e.kind() == contended || e.kind() == io::ErrorKind::WouldBlock => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        warn!(
                            "Gave up on {:?} lock for {} after {} attempts",
                            kind,
                            self.path.display(),
                            attempt
                        );
                        return Err(io::Error::new(
                            io::ErrorKind::WouldBlock,
                            format!("{:?} lock not acquired after {} attempts", kind, attempt),
                        ));
                    }
                    let delay = self.retry.jittered(attempt - 1);
                    debug!(
                        "{:?} lock on {} busy, retrying in {:?} (attempt {}/{})",
                        kind,
                        self.path.display(),
                        delay,
                        attempt,
                        self.retry.max_attempts
                    );
                    thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Temp file + fsync + rename; caller holds the exclusive lock
    fn write_locked(&self, payload: &CachePayload<T>) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(payload)
            .map_err(|e| self.write_error(format!("serialization failed: {}", e)))?;

        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, &bytes) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.write_error(format!("temporary file write failed: {}", e)));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.write_error(format!("rename failed: {}", e)));
        }

        // Persist the rename itself; not every platform allows fsync on a directory
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }

        debug!(
            "Wrote cache {} ({} clusters, {} bytes)",
            self.path.display(),
            payload.stats.total_clusters,
            bytes.len()
        );
        Ok(())
    }

    /// Unique per process and call so replicas never share a temp file
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path.with_file_name(format!(
            ".{}.tmp.{}.{}.{:08x}",
            name,
            std::process::id(),
            counter,
            rand::random::<u32>()
        ))
    }

    fn read_error(&self, reason: String) -> CacheError {
        CacheError::Read {
            path: self.path.clone(),
            reason,
        }
    }

    fn write_error(&self, reason: String) -> CacheError {
        CacheError::Write {
            path: self.path.clone(),
            reason,
        }
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}

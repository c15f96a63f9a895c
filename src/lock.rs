//! Cooperative, file-based advisory locking.
//!
//! Acquisition polls with backoff (never busy-spins, per `spec.md` §4.2) and
//! is exclusive across processes on the same filesystem via `fs2`'s
//! `flock`-family bindings.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{CoreError, CoreResult};

const POLL_START: Duration = Duration::from_millis(5);
const POLL_MAX: Duration = Duration::from_millis(200);

/// A hex digest of `identifier`, stable across processes, used to scope
/// lock filenames to their owning cache or source (`spec.md` §3).
pub fn lock_cache_id(identifier: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    identifier.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// An exclusive lock on a path, released on drop (success or failure on
/// every exit path, per `spec.md` §5 cancellation requirements).
pub struct ScopedLock {
    file: File,
    path: PathBuf,
}

impl ScopedLock {
    /// Acquire an exclusive lock on `path`, creating the lock file if
    /// needed, polling with exponential backoff up to `timeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).write(true).open(path)?;

        let start = Instant::now();
        let mut backoff = POLL_START;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::debug!(lock_path = %path.display(), "acquired tile lock");
                    return Ok(Self { file, path: path.to_path_buf() });
                }
                Err(_) => {
                    if start.elapsed() >= timeout {
                        return Err(CoreError::LockTimeout {
                            lock_path: path.display().to_string(),
                            timeout_secs: timeout.as_secs_f64(),
                        });
                    }
                    thread::sleep(backoff.min(timeout.saturating_sub(start.elapsed())));
                    backoff = (backoff * 2).min(POLL_MAX);
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Remove lock files in `lock_dir` older than `max_age`. Tolerates races
/// with concurrent lockers: a file that disappears between listing and
/// unlink is not an error (`spec.md` §5).
pub fn cleanup_lockdir(lock_dir: &Path, max_age: Duration) {
    let entries = match std::fs::read_dir(lock_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    let now = std::time::SystemTime::now();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("lck") {
            continue;
        }
        let age = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => now.duration_since(modified).unwrap_or_default(),
            Err(_) => continue,
        };
        if age >= max_age {
            let _ = std::fs::remove_file(&path);
        }
    }
}

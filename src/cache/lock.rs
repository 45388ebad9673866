//! Per-key advisory locks
//!
//! Cooperating morph processes serialize work on one cache key (an escaped
//! repository URL) through an exclusive `fs2` lock on
//! `<lock dir>/<key>.lock`. The lock is released when the guard drops.

use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Held exclusive lock on one cache key
#[derive(Debug)]
pub struct KeyLock {
    file: File,
    path: PathBuf,
}

impl KeyLock {
    /// Block until the lock for `key` is held, the deadline passes or the
    /// work is cancelled.
    pub fn acquire(lock_dir: &Path, key: &str, deadline: &Deadline) -> MorphResult<Self> {
        fs::create_dir_all(lock_dir).map_err(|e| {
            MorphError::io(format!("creating lock directory {}", lock_dir.display()), e)
        })?;

        let path = lock_dir.join(format!("{}.lock", key));
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| MorphError::io(format!("opening lock {}", path.display()), e))?;

        let mut waited = false;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Locked {}", path.display());
                    return Ok(Self { file, path });
                }
                Err(e) if is_contended(&e) => {
                    if !waited {
                        debug!("Waiting for lock {}", path.display());
                        waited = true;
                    }
                }
                Err(e) => {
                    return Err(MorphError::io(format!("locking {}", path.display()), e));
                }
            }

            match deadline.check(&format!("waiting for lock {}", path.display())) {
                Ok(()) => {}
                Err(MorphError::DeadlineExceeded(_)) => {
                    return Err(MorphError::LockTimeout { path });
                }
                Err(e) => return Err(e),
            }

            thread::sleep(RETRY_INTERVAL);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        // Lock files are never unlinked; waiters may hold them open
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

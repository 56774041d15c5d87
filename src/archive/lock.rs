use crate::archive::config::LockingConfig;
use crate::error::{LifecycleError, LifecycleResult};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Advisory per-object locks shared by every process using the same lock dir.
#[derive(Debug, Clone)]
pub struct ObjectLocks {
    dir: PathBuf,
    policy: LockingConfig,
}

/// Held for the duration of one per-object operation; released on drop.
#[derive(Debug)]
pub struct ObjectLock {
    file: File,
}

impl Drop for ObjectLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl ObjectLocks {
    pub fn new(dir: impl Into<PathBuf>, policy: LockingConfig) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    pub fn lock_path(&self, identity: &str) -> PathBuf {
        let key = format!("{:x}", Sha256::digest(identity.as_bytes()));
        self.dir.join(format!("{key}.lock"))
    }

    /// Take the exclusive lock for `identity`, retrying with linear backoff.
    /// `object` is only used for error reporting.
    pub fn acquire(&self, identity: &str, object: &Path) -> LifecycleResult<ObjectLock> {
        fs::create_dir_all(&self.dir).map_err(|err| LifecycleError::io(&self.dir, err))?;
        let path = self.lock_path(identity);
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| LifecycleError::io(&path, err))?;

        for attempt in 0..=self.policy.retries {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(ObjectLock { file }),
                Err(_) if attempt < self.policy.retries => {
                    let delay_ms = self.policy.backoff_ms * u64::from(attempt + 1);
                    thread::sleep(Duration::from_millis(delay_ms));
                }
                Err(_) => break,
            }
        }

        Err(LifecycleError::ObjectLocked {
            path: object.to_path_buf(),
        })
    }
}

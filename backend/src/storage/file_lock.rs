//! Exclusive lock on a database file
//!
//! The KeePass-style destination holds a lock on a `<database>.lock` sidecar
//! for as long as the database is open, so two runs never rewrite the same
//! file. The lock is released on drop; the sidecar stays in place so every
//! run contends on the same inode.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Delay between lock attempts
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Lock held on a database sidecar file, released on drop
#[derive(Debug)]
pub struct DatabaseLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
    locked: bool,
}

impl DatabaseLock {
    /// Sidecar path used for a database file
    pub fn lock_path_for(database: &Path) -> PathBuf {
        let mut name = database
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        database.with_file_name(name)
    }

    /// Acquire the lock for `database`, waiting up to `timeout`
    pub fn acquire(database: &Path, timeout: Duration) -> StoreResult<Self> {
        let lock_path = Self::lock_path_for(database);
        debug!("Acquiring database lock: {:?}", lock_path);

        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Self::lock_error(&lock_path, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Self::lock_error(&lock_path, e))?;

        let start = Instant::now();
        loop {
            match Self::try_lock(&file) {
                Ok(()) => {
                    debug!("Acquired database lock: {:?}", lock_path);
                    return Ok(Self {
                        file,
                        lock_path,
                        locked: true,
                    });
                }
                Err(_) if start.elapsed() < timeout => {
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(StoreError::Lock {
                        path: lock_path.to_string_lossy().to_string(),
                        reason: format!("timed out after {:?}: {}", timeout, e),
                    });
                }
            }
        }
    }

    fn lock_error(path: &Path, e: std::io::Error) -> StoreError {
        StoreError::Lock {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        }
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> Result<(), std::io::Error> {
        use std::os::unix::io::AsRawFd;

        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    // Advisory locking is only implemented with flock
    #[cfg(not(unix))]
    fn try_lock(_file: &File) -> Result<(), std::io::Error> {
        Ok(())
    }

    /// Release the lock early; dropping does the same
    pub fn unlock(&mut self) -> Result<(), std::io::Error> {
        if !self.locked {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = self.file.as_raw_fd();
            let result = unsafe { libc::flock(fd, libc::LOCK_UN) };
            if result != 0 {
                return Err(std::io::Error::last_os_error());
            }
        }

        self.locked = false;
        debug!("Released database lock: {:?}", self.lock_path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            warn!("Failed to unlock {:?} on drop: {}", self.lock_path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            DatabaseLock::lock_path_for(Path::new("/data/vault.yml")),
            PathBuf::from("/data/vault.yml.lock")
        );
    }

    #[test]
    fn test_acquire_creates_sidecar() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("vault.yml");

        let lock = DatabaseLock::acquire(&db, Duration::from_secs(1)).unwrap();
        assert!(lock.path().exists());

        drop(lock);
        assert!(dir.path().join("vault.yml.lock").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_waiter_and_new_run_share_sidecar() {
        use std::os::unix::io::AsRawFd;

        let dir = tempdir().unwrap();
        let db = dir.path().join("vault.yml");

        let first = DatabaseLock::acquire(&db, Duration::from_secs(1)).unwrap();
        // a run that opened the sidecar while the first one held it
        let waiter = OpenOptions::new()
            .write(true)
            .open(first.path())
            .unwrap();
        drop(first);

        let _second = DatabaseLock::acquire(&db, Duration::from_secs(1)).unwrap();
        let result = unsafe { libc::flock(waiter.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        assert_ne!(result, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_second_lock_times_out() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("vault.yml");

        let _held = DatabaseLock::acquire(&db, Duration::from_secs(1)).unwrap();

        let start = Instant::now();
        let result = DatabaseLock::acquire(&db, Duration::from_millis(300));
        assert_matches!(result, Err(StoreError::Lock { .. }));
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_relock_after_drop() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("vault.yml");

        {
            let _lock = DatabaseLock::acquire(&db, Duration::from_secs(1)).unwrap();
        }

        assert!(DatabaseLock::acquire(&db, Duration::from_millis(200)).is_ok());
    }
}

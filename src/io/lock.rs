use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Advisory lock serializing read-modify-write cycles on a shared store file.
///
/// Uses platform-native flock (Unix) so that several `tn` processes (tabs)
/// writing the same store never drop each other's keys. The lock is
/// released when the value is dropped and the file handle closes.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not acquire lock on {path}: another tab may be writing")]
    Timeout { path: PathBuf },
}

impl FileLock {
    /// Acquire an exclusive lock on `lock_path`, creating it if needed.
    /// Blocks up to `timeout` waiting for the lock.
    pub fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| LockError::CreateError {
                path: lock_path.to_path_buf(),
                source: e,
            })?;

        let start = Instant::now();
        loop {
            match try_lock(&file) {
                Ok(()) => {
                    return Ok(FileLock {
                        _file: file,
                        path: lock_path.to_path_buf(),
                    });
                }
                Err(_) if start.elapsed() < timeout => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(_) => {
                    return Err(LockError::Timeout {
                        path: lock_path.to_path_buf(),
                    });
                }
            }
        }
    }

    /// Acquire with default timeout (5 seconds)
    pub fn acquire_default(lock_path: &Path) -> Result<Self, LockError> {
        Self::acquire(lock_path, Duration::from_secs(5))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Try to acquire an exclusive flock on the file (non-blocking)
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

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    // Advisory only; other platforms fall back to no locking
    Ok(())
}

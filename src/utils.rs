use crate::errors::{Result, StaxError};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Atomic file operations to prevent corruption during writes
pub mod atomic_file {
    use super::*;

    /// Write JSON data to a file atomically using a temporary file + rename strategy with file locking
    pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        ensure_parent_dir(path)?;
        crate::utils::file_locking::with_file_lock(path, || {
            let content = serde_json::to_string_pretty(data)
                .map_err(|e| StaxError::config(format!("Failed to serialize data: {e}")))?;

            write_string_unlocked(path, &content)
        })
    }

    fn ensure_parent_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StaxError::config(format!("Failed to create directory {parent:?}: {e}"))
                })?;
            }
        }
        Ok(())
    }

    fn write_string_unlocked(path: &Path, content: &str) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, content)
            .map_err(|e| StaxError::config(format!("Failed to write temporary file: {e}")))?;

        atomic_rename(&temp_path, path)
    }

    #[cfg(windows)]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        const MAX_RETRIES: u32 = 3;
        const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

        let mut attempt = 1;
        loop {
            match fs::rename(temp_path, final_path) {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= MAX_RETRIES => {
                    let _ = fs::remove_file(temp_path);
                    return Err(StaxError::config(format!(
                        "Failed to finalize file write after {MAX_RETRIES} attempts on Windows: {e}"
                    )));
                }
                Err(_) => {
                    attempt += 1;
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }
    }

    #[cfg(not(windows))]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        fs::rename(temp_path, final_path)
            .map_err(|e| StaxError::config(format!("Failed to finalize file write: {e}")))?;
        Ok(())
    }
}

/// File locking utilities for concurrent access protection
pub mod file_locking {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::time::{Duration, Instant};

    /// A lock file next to the guarded file, removed on drop
    pub struct FileLock {
        _file: File,
        lock_path: std::path::PathBuf,
    }

    impl FileLock {
        #[cfg(windows)]
        const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
        #[cfg(windows)]
        const RETRY_INTERVAL: Duration = Duration::from_millis(100);

        #[cfg(not(windows))]
        const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
        #[cfg(not(windows))]
        const RETRY_INTERVAL: Duration = Duration::from_millis(50);

        /// Attempt to acquire a lock on a file with timeout
        pub fn acquire_with_timeout(file_path: &Path, timeout: Duration) -> Result<Self> {
            let lock_path = file_path.with_extension("lock");
            let start_time = Instant::now();

            loop {
                match Self::try_acquire(&lock_path) {
                    Ok(lock) => return Ok(lock),
                    Err(e) => {
                        if start_time.elapsed() >= timeout {
                            return Err(StaxError::config(format!(
                                "Timeout waiting for lock on {file_path:?} after {}ms: {e}",
                                timeout.as_millis()
                            )));
                        }
                        std::thread::sleep(Self::RETRY_INTERVAL);
                    }
                }
            }
        }

        /// Try to acquire a lock immediately (non-blocking)
        pub fn try_acquire(lock_path: &Path) -> Result<Self> {
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(lock_path)
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::AlreadyExists => StaxError::config(format!(
                        "Lock file {lock_path:?} already exists - another process may be accessing the file"
                    )),
                    _ => StaxError::config(format!("Failed to acquire lock {lock_path:?}: {e}")),
                })?;

            Ok(Self {
                _file: file,
                lock_path: lock_path.to_path_buf(),
            })
        }

        /// Acquire a lock with the platform default timeout
        pub fn acquire(file_path: &Path) -> Result<Self> {
            Self::acquire_with_timeout(file_path, Self::DEFAULT_TIMEOUT)
        }
    }

    impl Drop for FileLock {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }

    /// Execute an operation with file locking protection
    pub fn with_file_lock<F, R>(file_path: &Path, operation: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        let _lock = FileLock::acquire(file_path)?;
        operation()
    }
}

/// Bounded fan-out for I/O-bound side work
pub mod worker_pool {
    use super::*;
    use std::future::Future;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    /// Run `task` for every item with at most `width` in flight.
    ///
    /// Every spawned task is awaited before returning. Results keep the
    /// order of `items`; the first error (in item order) is returned.
    pub async fn run_bounded<I, T, F, Fut>(items: Vec<I>, width: usize, task: F) -> Result<Vec<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(width.max(1)));
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| StaxError::config(format!("Worker pool closed: {e}")))?;
            let fut = task(item);
            handles.push(tokio::spawn(async move {
                let result = fut.await;
                drop(permit);
                result
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(StaxError::config(format!("Worker task failed: {e}")));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

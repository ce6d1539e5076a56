use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const COMMIT_WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(10);

/// Exclusive hold on a store file for the length of one commit.
///
/// The flock sits on a `<store>.lock` sibling, which also records the pid of
/// the `nm` process holding it so a timeout can say who is in the way.
pub struct StoreLock {
    _file: File,
    lock_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("flock on {path} failed: {source}")]
    FlockError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{store} is being committed by {}", holder_text(.holder))]
    Timeout { store: PathBuf, holder: Option<u32> },
}

fn holder_text(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!("nm process {}", pid),
        None => "another nm process".to_string(),
    }
}

impl StoreLock {
    /// Wait up to `wait` for the store to be free, then take it.
    pub fn acquire(store: &Path, wait: Duration) -> Result<Self, LockError> {
        let lock_path = lock_path_for(store);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| LockError::CreateError {
                path: lock_path.clone(),
                source: e,
            })?;

        let start = Instant::now();
        while !try_flock(&file).map_err(|e| LockError::FlockError {
            path: lock_path.clone(),
            source: e,
        })? {
            if start.elapsed() >= wait {
                return Err(LockError::Timeout {
                    store: store.to_path_buf(),
                    holder: read_holder(&mut file),
                });
            }
            std::thread::sleep(POLL);
        }
        if start.elapsed() > POLL {
            log::debug!("Waited {:?} for {}", start.elapsed(), lock_path.display());
        }

        // Best effort: the pid only improves the timeout message
        let _ = write_holder(&mut file);
        Ok(StoreLock {
            _file: file,
            lock_path,
        })
    }

    pub fn acquire_default(store: &Path) -> Result<Self, LockError> {
        Self::acquire(store, COMMIT_WAIT)
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // flock goes with the descriptor
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(store: &Path) -> PathBuf {
    let mut name = store
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    store.with_file_name(name)
}

fn write_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.rewind()?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut text = String::new();
    file.rewind().ok()?;
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}

/// Non-blocking exclusive flock. `Ok(false)` means someone else holds it.
#[cfg(unix)]
fn try_flock(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

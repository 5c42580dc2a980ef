use crate::error::CastorError;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};
use tempfile::Builder;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive lock file granting write ownership of a durable store.
///
/// The file holds the owner's pid and is removed when the lock is dropped.
/// It is published fully written, so a reader never sees it empty.
#[derive(Debug)]
pub struct AdvisoryLock {
    path: PathBuf,
}

impl AdvisoryLock {
    /// Waits up to `wait` for the lock at `path`.
    pub async fn acquire(path: &Path, wait: Duration) -> Result<Self, CastorError> {
        let deadline = Instant::now() + wait;
        loop {
            let attempt_path = path.to_path_buf();
            let created = tokio::task::spawn_blocking(move || try_create(&attempt_path))
                .await
                .map_err(|e| CastorError::UnexpectedError(format!("lock task failed: {e}")))?;

            match created {
                Ok(()) => {
                    info!(file = %path.display(), "Acquired advisory lock");
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        warn!(file = %path.display(), "Removing stale advisory lock");
                        remove_if_exists(path)?;
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(CastorError::LockTimeout {
                            path: path.display().to_string(),
                        });
                    }
                    debug!(file = %path.display(), "Advisory lock held elsewhere; waiting");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(file = %self.path.display(), "Released advisory lock"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(file = %self.path.display(), error = %err, "Failed to release advisory lock");
            }
        }
    }
}

/// Writes our pid to a temp file beside `path`, then links it into place
/// without replacing an existing lock.
fn try_create(path: &Path) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "lock path has no parent directory")
    })?;

    let mut builder = Builder::new();
    builder.prefix(".castor-lock");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(dir)?;
    file.write_all(std::process::id().to_string().as_bytes())?;
    file.as_file().sync_all()?;
    file.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

/// A lock is stale when its pid is unreadable or names a process that is gone.
fn is_stale(path: &Path) -> bool {
    let pid = match fs::read_to_string(path) {
        Ok(content) => content.trim().parse::<u32>().ok(),
        // Released between our create attempt and this read.
        Err(err) if err.kind() == io::ErrorKind::NotFound => return false,
        Err(_) => None,
    };
    match pid {
        Some(pid) if pid == std::process::id() => false,
        Some(pid) => !process_alive(pid),
        None => true,
    }
}

fn process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw == 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(Errno::ESRCH) => false,
        Err(errno) => {
            warn!(pid, error = %errno, "Cannot check lock owner; assuming alive");
            true
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<(), CastorError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

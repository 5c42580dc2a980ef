use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;

/// Replaces `path` with `contents` through a synced temp file in the same
/// directory, so readers see either the old or the new file, never a partial one.
///
/// A failed write removes its temp file.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;
    std::fs::create_dir_all(dir)?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("castor"),
    );
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

/// [`atomic_write`] on the blocking pool.
pub(crate) async fn atomic_write_async(path: PathBuf, contents: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || atomic_write(&path, &contents))
        .await
        .map_err(io::Error::other)?
}

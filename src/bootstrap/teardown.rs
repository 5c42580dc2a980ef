use crate::engine::StorageTarget;
use crate::migration::{KvStore, SCHEMA_HASH_KEY};
use std::{io, path::PathBuf};
use tracing::{info, warn};

const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// Deletes the persisted database and forgets the cached schema hash.
///
/// Failures are logged and swallowed. An instance that is still open keeps
/// working against its own handles; the next process starts from scratch.
pub async fn reset_database(storage: &StorageTarget, kv: &dyn KvStore) {
    match storage.database_path() {
        Some(path) => {
            let mut targets = vec![path.clone()];
            targets.extend(SIDECAR_SUFFIXES.iter().map(|suffix| sidecar(&path, suffix)));
            for target in targets {
                remove_quietly(target).await;
            }
        }
        None => {
            warn!(
                storage = %storage.describe(),
                "No durable storage to delete; in-memory data lives until the engine closes"
            );
        }
    }

    if let Err(e) = kv.remove(SCHEMA_HASH_KEY).await {
        warn!(error = %e, "Failed to clear cached schema hash");
    }
    info!(storage = %storage.describe(), "Database reset completed");
}

fn sidecar(path: &std::path::Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

async fn remove_quietly(path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => info!(path = %path.display(), "Removed database file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove database file"),
    }
}

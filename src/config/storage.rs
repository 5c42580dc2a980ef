use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the database file, its lock file and the key-value cache.
    /// Unset means the database lives in memory for the lifetime of the process.
    /// TOML: `storage.data_dir`. Default: unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Fixed logical name of the storage unit.
    /// TOML: `storage.database_name`. Default: `castor-local-db`.
    #[serde(default = "default_database_name")]
    pub database_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_name: default_database_name(),
        }
    }
}

fn default_database_name() -> String {
    "castor-local-db".to_string()
}

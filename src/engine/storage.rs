use super::capabilities::Capabilities;
use crate::config::StorageConfig;
use std::path::PathBuf;

const KV_FILE_NAME: &str = "castor-kv.json";

/// Where the engine keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    /// `<dir>/<database_name>.sqlite`, persisted across processes.
    Durable { dir: PathBuf, database_name: String },
    /// Lives as long as the engine instance.
    Memory { database_name: String },
}

impl StorageTarget {
    pub fn resolve(cfg: &StorageConfig, caps: &Capabilities) -> Self {
        match cfg.data_dir.as_ref() {
            Some(dir) if caps.durable_storage => StorageTarget::Durable {
                dir: dir.clone(),
                database_name: cfg.database_name.clone(),
            },
            _ => StorageTarget::Memory {
                database_name: cfg.database_name.clone(),
            },
        }
    }

    pub fn database_name(&self) -> &str {
        match self {
            StorageTarget::Durable { database_name, .. }
            | StorageTarget::Memory { database_name } => database_name,
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, StorageTarget::Durable { .. })
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.in_dir(|name| format!("{name}.sqlite"))
    }

    pub fn lock_path(&self) -> Option<PathBuf> {
        self.in_dir(|name| format!("{name}.lock"))
    }

    pub fn kv_path(&self) -> Option<PathBuf> {
        self.in_dir(|_| KV_FILE_NAME.to_string())
    }

    /// Directory loadable extensions are materialized into.
    pub fn extensions_dir(&self) -> PathBuf {
        match self {
            StorageTarget::Durable { dir, .. } => dir.join("extensions"),
            StorageTarget::Memory { database_name } => {
                std::env::temp_dir().join(format!("{database_name}-extensions"))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self.database_path() {
            Some(path) => path.display().to_string(),
            None => format!("memory:{}", self.database_name()),
        }
    }

    fn in_dir(&self, file: impl FnOnce(&str) -> String) -> Option<PathBuf> {
        match self {
            StorageTarget::Durable { dir, database_name } => Some(dir.join(file(database_name))),
            StorageTarget::Memory { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn durable_caps() -> Capabilities {
        Capabilities {
            background_context: false,
            advisory_lock: true,
            durable_storage: true,
        }
    }

    #[test]
    fn durable_paths_share_the_data_dir() {
        let cfg = StorageConfig {
            data_dir: Some(PathBuf::from("/data")),
            database_name: "local".to_string(),
        };
        let target = StorageTarget::resolve(&cfg, &durable_caps());

        assert!(target.is_durable());
        assert_eq!(target.database_path(), Some(PathBuf::from("/data/local.sqlite")));
        assert_eq!(target.lock_path(), Some(PathBuf::from("/data/local.lock")));
        assert_eq!(target.kv_path(), Some(PathBuf::from("/data/castor-kv.json")));
    }

    #[test]
    fn data_dir_without_durable_capability_falls_back_to_memory() {
        let cfg = StorageConfig {
            data_dir: Some(PathBuf::from("/data")),
            database_name: "local".to_string(),
        };
        let target = StorageTarget::resolve(&cfg, &Capabilities::ephemeral());

        assert_eq!(
            target,
            StorageTarget::Memory {
                database_name: "local".to_string()
            }
        );
        assert!(target.database_path().is_none());
        assert_eq!(target.describe(), "memory:local");
    }
}

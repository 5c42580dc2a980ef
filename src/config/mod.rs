mod artifacts;
mod basic;
mod execution;
mod storage;

pub use artifacts::ArtifactsConfig;
pub use basic::BasicConfig;
pub use execution::ExecutionConfig;
pub use storage::StorageConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::LazyLock};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core settings (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Where the database and its key-value cache live (see `storage` table).
    #[serde(default)]
    pub storage: StorageConfig,

    /// Engine binary and dependency artifacts (see `artifacts` table).
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Execution strategy knobs (see `execution` table).
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Process-wide configuration, loaded on first access.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_optional_toml);

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "CASTOR_";

impl Config {
    /// Builds a Figment that merges defaults, an optional config TOML file and
    /// `CASTOR_`-prefixed environment variables (`__` separates tables).
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads configuration by merging defaults, `config.toml` if present and the environment.
    pub fn from_optional_toml() -> Self {
        Self::figment().extract().unwrap_or_else(|err| {
            panic!("failed to extract configuration (defaults + optional config.toml + env): {err}")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_memory_storage_and_no_ready_delay() {
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .extract()
            .expect("defaults extract");

        assert!(cfg.storage.data_dir.is_none());
        assert_eq!(cfg.storage.database_name, "castor-local-db");
        assert_eq!(cfg.execution.ready_delay_ms, 0);
        assert!(cfg.execution.allow_worker);
        assert_eq!(cfg.artifacts.engine, "castor-engine.wasm");
        assert!(cfg.artifacts.vector_extension.is_none());
    }

    #[test]
    fn toml_overrides_nested_tables() {
        let toml = r#"
            [storage]
            data_dir = "/var/lib/castor"

            [artifacts]
            base_url = "https://cdn.example.com/castor/"
            vector_extension = "vec0.so"

            [execution]
            allow_worker = false
            ready_delay_ms = 50
        "#;
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .expect("toml extract");

        assert_eq!(
            cfg.storage.data_dir,
            Some(PathBuf::from("/var/lib/castor"))
        );
        assert_eq!(
            cfg.artifacts.base_url.as_str(),
            "https://cdn.example.com/castor/"
        );
        assert_eq!(cfg.artifacts.vector_extension.as_deref(), Some("vec0.so"));
        assert!(!cfg.execution.allow_worker);
        assert_eq!(cfg.execution.ready_delay_ms, 50);
    }
}

use serde::{Deserialize, Serialize};
use url::Url;

/// Where the engine binary and its dependencies are fetched from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsConfig {
    /// Base URL every artifact name is resolved against.
    /// TOML: `artifacts.base_url`. Default: `http://127.0.0.1:8787/artifacts/`.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Engine module file name. TOML: `artifacts.engine`.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Optional lowercase hex SHA-256 pin for the engine module.
    /// TOML: `artifacts.engine_sha256`.
    #[serde(default)]
    pub engine_sha256: Option<String>,

    /// Backend bindings file name. TOML: `artifacts.backend`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Filesystem bundle blob. TOML: `artifacts.fs_bundle`.
    #[serde(default = "default_fs_bundle")]
    pub fs_bundle: String,

    /// Optional vector-search extension. TOML: `artifacts.vector_extension`.
    #[serde(default)]
    pub vector_extension: Option<String>,

    /// Optional HTTP proxy for artifact downloads.
    /// TOML: `artifacts.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            engine: default_engine(),
            engine_sha256: None,
            backend: default_backend(),
            fs_bundle: default_fs_bundle(),
            vector_extension: None,
            proxy: None,
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("http://127.0.0.1:8787/artifacts/").expect("valid default artifacts base URL")
}

fn default_engine() -> String {
    "castor-engine.wasm".to_string()
}

fn default_backend() -> String {
    "castor-backend.bin".to_string()
}

fn default_fs_bundle() -> String {
    "castor-fs.data".to_string()
}

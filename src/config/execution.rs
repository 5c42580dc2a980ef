use serde::{Deserialize, Serialize};

/// Execution strategy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Permit the background worker mode when the runtime supports it.
    /// TOML: `execution.allow_worker`. Default: `true`.
    #[serde(default = "default_allow_worker")]
    pub allow_worker: bool,

    /// How long the worker waits for the advisory lock before giving up.
    /// TOML: `execution.lock_wait_secs`. Default: `30`.
    #[serde(default = "default_lock_wait_secs")]
    pub lock_wait_secs: u64,

    /// Pause between `Finished` and `Ready`, letting observers render the final state.
    /// TOML: `execution.ready_delay_ms`. Default: `0`.
    #[serde(default)]
    pub ready_delay_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            allow_worker: default_allow_worker(),
            lock_wait_secs: default_lock_wait_secs(),
            ready_delay_ms: 0,
        }
    }
}

fn default_allow_worker() -> bool {
    true
}

fn default_lock_wait_secs() -> u64 {
    30
}

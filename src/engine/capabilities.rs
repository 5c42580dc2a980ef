use crate::config::Config;
use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Runtime capabilities, resolved once by the composition root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// A background execution context can host the engine (multi-threaded runtime).
    pub background_context: bool,
    /// A cross-context advisory lock is available (needs a data directory).
    pub advisory_lock: bool,
    /// A durable storage location exists.
    pub durable_storage: bool,
}

impl Capabilities {
    pub fn detect(cfg: &Config) -> Self {
        let multi_thread = Handle::try_current()
            .is_ok_and(|h| h.runtime_flavor() == RuntimeFlavor::MultiThread);
        let durable_storage = cfg
            .storage
            .data_dir
            .as_ref()
            .is_some_and(|dir| std::fs::create_dir_all(dir).is_ok());

        Self {
            background_context: cfg.execution.allow_worker && multi_thread,
            advisory_lock: durable_storage,
            durable_storage,
        }
    }

    /// No background context, no lock, memory storage. Typical for tests.
    pub fn ephemeral() -> Self {
        Self {
            background_context: false,
            advisory_lock: false,
            durable_storage: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    Worker,
    InProcess,
}

/// Worker mode needs both a background context and the advisory lock.
pub fn select_strategy(caps: &Capabilities) -> ExecutionMode {
    if caps.background_context && caps.advisory_lock {
        ExecutionMode::Worker
    } else {
        ExecutionMode::InProcess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_requires_both_primitives() {
        let both = Capabilities {
            background_context: true,
            advisory_lock: true,
            durable_storage: true,
        };
        assert_eq!(select_strategy(&both), ExecutionMode::Worker);

        let no_lock = Capabilities {
            advisory_lock: false,
            ..both
        };
        assert_eq!(select_strategy(&no_lock), ExecutionMode::InProcess);

        let no_context = Capabilities {
            background_context: false,
            ..both
        };
        assert_eq!(select_strategy(&no_context), ExecutionMode::InProcess);
        assert_eq!(
            select_strategy(&Capabilities::ephemeral()),
            ExecutionMode::InProcess
        );
    }

    #[test]
    fn detect_without_data_dir_is_memory_only() {
        let caps = Capabilities::detect(&Config::default());
        assert!(!caps.durable_storage);
        assert!(!caps.advisory_lock);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn detect_with_data_dir_on_multi_thread_runtime_allows_worker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = Config::default();
        cfg.storage.data_dir = Some(dir.path().join("db"));

        let caps = Capabilities::detect(&cfg);
        assert!(caps.background_context);
        assert!(caps.durable_storage);
        assert_eq!(select_strategy(&caps), ExecutionMode::Worker);

        cfg.execution.allow_worker = false;
        assert_eq!(
            select_strategy(&Capabilities::detect(&cfg)),
            ExecutionMode::InProcess
        );
    }
}

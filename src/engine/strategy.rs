use super::EngineArtifacts;
use super::capabilities::ExecutionMode;
use super::handle::DatabaseHandle;
use super::in_process::InProcessStrategy;
use super::storage::StorageTarget;
use super::worker::WorkerStrategy;
use crate::config::ExecutionConfig;
use crate::error::CastorError;
use async_trait::async_trait;
use std::time::Duration;

/// Turns loaded artifacts into a live handle.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    async fn instantiate(
        &self,
        storage: &StorageTarget,
        artifacts: EngineArtifacts,
    ) -> Result<DatabaseHandle, CastorError>;
}

pub fn strategy_for(mode: ExecutionMode, cfg: &ExecutionConfig) -> Box<dyn ExecutionStrategy> {
    match mode {
        ExecutionMode::Worker => Box::new(WorkerStrategy::new(Duration::from_secs(
            cfg.lock_wait_secs,
        ))),
        ExecutionMode::InProcess => Box::new(InProcessStrategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_reports_the_mode_it_was_built_for() {
        let cfg = ExecutionConfig::default();
        for mode in [ExecutionMode::Worker, ExecutionMode::InProcess] {
            assert_eq!(strategy_for(mode, &cfg).mode(), mode);
        }
    }
}

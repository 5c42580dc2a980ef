//! Engine instantiation: capability detection, storage layout and the two
//! execution strategies producing a [`DatabaseHandle`].

mod capabilities;
mod handle;
mod in_process;
mod lock;
mod sqlite;
mod storage;
mod strategy;
mod worker;

pub use capabilities::{Capabilities, ExecutionMode, select_strategy};
pub use handle::{DatabaseClient, DatabaseHandle, Row, Statement};
pub use in_process::InProcessStrategy;
pub use lock::AdvisoryLock;
pub use storage::StorageTarget;
pub use strategy::{ExecutionStrategy, strategy_for};
pub use worker::WorkerStrategy;

use crate::error::CastorError;
use crate::loader::{CompiledModule, Dependencies};

/// Everything the loaders produced for one instantiation.
#[derive(Debug, Clone)]
pub struct EngineArtifacts {
    pub module: CompiledModule,
    pub dependencies: Dependencies,
}

impl EngineArtifacts {
    /// Rejects artifact sets that cannot back an engine instance.
    pub fn validate(&self) -> Result<(), CastorError> {
        if self.dependencies.backend.bytes.is_empty() {
            return Err(CastorError::Compile(format!(
                "backend bindings `{}` are empty",
                self.dependencies.backend.name
            )));
        }
        Ok(())
    }
}

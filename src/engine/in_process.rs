use super::capabilities::ExecutionMode;
use super::handle::{DatabaseClient, DatabaseHandle, Row, Statement};
use super::sqlite;
use super::storage::StorageTarget;
use super::strategy::ExecutionStrategy;
use super::EngineArtifacts;
use crate::error::CastorError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Runs the engine on the caller's runtime, sharing its pool directly.
pub struct InProcessStrategy;

#[async_trait]
impl ExecutionStrategy for InProcessStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::InProcess
    }

    async fn instantiate(
        &self,
        storage: &StorageTarget,
        artifacts: EngineArtifacts,
    ) -> Result<DatabaseHandle, CastorError> {
        let pool = sqlite::open_pool(storage, &artifacts).await?;
        Ok(DatabaseHandle::new(
            Arc::new(InProcessClient { pool }),
            ExecutionMode::InProcess,
            storage.clone(),
        ))
    }
}

struct InProcessClient {
    pool: SqlitePool,
}

#[async_trait]
impl DatabaseClient for InProcessClient {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, CastorError> {
        sqlite::query(&self.pool, sql, &params).await
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, CastorError> {
        sqlite::execute(&self.pool, sql, &params).await
    }

    async fn transaction(&self, statements: Vec<Statement>) -> Result<(), CastorError> {
        sqlite::transaction(&self.pool, &statements).await
    }

    async fn close(&self) -> Result<(), CastorError> {
        self.pool.close().await;
        Ok(())
    }
}

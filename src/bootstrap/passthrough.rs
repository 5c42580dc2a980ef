use super::manager::DatabaseManager;
use crate::engine::{DatabaseClient, Row, Statement};
use crate::error::CastorError;
use async_trait::async_trait;
use serde_json::Value;

/// Forwards every call to the manager's ready handle.
///
/// Safe to hand out before bootstrap completes; calls made too early fail with
/// [`CastorError::NotInitialized`] instead of waiting.
#[derive(Clone)]
pub struct DatabasePassthrough {
    manager: DatabaseManager,
}

impl DatabasePassthrough {
    pub(crate) fn new(manager: DatabaseManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl DatabaseClient for DatabasePassthrough {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, CastorError> {
        self.manager.handle()?.query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, CastorError> {
        self.manager.handle()?.execute(sql, params).await
    }

    async fn transaction(&self, statements: Vec<Statement>) -> Result<(), CastorError> {
        self.manager.handle()?.transaction(statements).await
    }

    async fn close(&self) -> Result<(), CastorError> {
        self.manager.handle()?.close().await
    }
}

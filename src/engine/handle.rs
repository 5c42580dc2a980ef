use super::capabilities::ExecutionMode;
use super::storage::StorageTarget;
use crate::error::CastorError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One result row, column name to value.
pub type Row = Map<String, Value>;

/// A parameterized statement executed as part of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Operations every engine instance supports, regardless of where it runs.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, CastorError>;

    /// Returns the number of affected rows.
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, CastorError>;

    /// Runs every statement or none of them.
    async fn transaction(&self, statements: Vec<Statement>) -> Result<(), CastorError>;

    async fn close(&self) -> Result<(), CastorError>;
}

/// The live database. Cloning shares the same engine instance.
#[derive(Clone)]
pub struct DatabaseHandle {
    client: Arc<dyn DatabaseClient>,
    mode: ExecutionMode,
    storage: StorageTarget,
}

impl DatabaseHandle {
    pub fn new(
        client: Arc<dyn DatabaseClient>,
        mode: ExecutionMode,
        storage: StorageTarget,
    ) -> Self {
        Self {
            client,
            mode,
            storage,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn storage(&self) -> &StorageTarget {
        &self.storage
    }

    /// True when both handles point at the same engine instance.
    pub fn same_instance(&self, other: &DatabaseHandle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.client), Arc::as_ptr(&other.client))
    }

    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, CastorError> {
        self.client.query(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, CastorError> {
        self.client.execute(sql, params).await
    }

    pub async fn transaction(&self, statements: Vec<Statement>) -> Result<(), CastorError> {
        self.client.transaction(statements).await
    }

    pub async fn close(&self) -> Result<(), CastorError> {
        self.client.close().await
    }
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("mode", &self.mode)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

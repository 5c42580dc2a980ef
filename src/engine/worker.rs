use super::EngineArtifacts;
use super::capabilities::ExecutionMode;
use super::handle::{DatabaseClient, DatabaseHandle, Row, Statement};
use super::lock::AdvisoryLock;
use super::sqlite;
use super::storage::StorageTarget;
use super::strategy::ExecutionStrategy;
use crate::error::CastorError;
use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde_json::Value;
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Hosts the engine inside a background actor that owns the pool and the
/// store's advisory lock; callers talk to it through messages.
pub struct WorkerStrategy {
    lock_wait: Duration,
}

impl WorkerStrategy {
    pub fn new(lock_wait: Duration) -> Self {
        Self { lock_wait }
    }
}

#[async_trait]
impl ExecutionStrategy for WorkerStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Worker
    }

    async fn instantiate(
        &self,
        storage: &StorageTarget,
        artifacts: EngineArtifacts,
    ) -> Result<DatabaseHandle, CastorError> {
        let lock_path = storage.lock_path().ok_or_else(|| {
            CastorError::UnexpectedError("worker mode requires durable storage".to_string())
        })?;
        let lock = AdvisoryLock::acquire(&lock_path, self.lock_wait).await?;

        let (actor, _jh) = Actor::spawn(
            None,
            DbWorker,
            DbWorkerArgs {
                storage: storage.clone(),
                artifacts,
                lock,
            },
        )
        .await
        .map_err(|e| CastorError::RactorError(format!("DbWorker spawn failed: {e}")))?;

        Ok(DatabaseHandle::new(
            Arc::new(WorkerClient { actor }),
            ExecutionMode::Worker,
            storage.clone(),
        ))
    }
}

#[derive(Debug)]
enum DbWorkerMessage {
    Query(String, Vec<Value>, RpcReplyPort<Result<Vec<Row>, CastorError>>),
    Execute(String, Vec<Value>, RpcReplyPort<Result<u64, CastorError>>),
    Transaction(Vec<Statement>, RpcReplyPort<Result<(), CastorError>>),
    /// Close the pool, release the lock and stop the worker.
    Close(RpcReplyPort<Result<(), CastorError>>),
}

struct WorkerClient {
    actor: ActorRef<DbWorkerMessage>,
}

#[async_trait]
impl DatabaseClient for WorkerClient {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, CastorError> {
        ractor::call!(self.actor, DbWorkerMessage::Query, sql.to_string(), params)
            .map_err(|e| CastorError::RactorError(format!("DbWorker Query RPC failed: {e}")))?
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, CastorError> {
        ractor::call!(self.actor, DbWorkerMessage::Execute, sql.to_string(), params)
            .map_err(|e| CastorError::RactorError(format!("DbWorker Execute RPC failed: {e}")))?
    }

    async fn transaction(&self, statements: Vec<Statement>) -> Result<(), CastorError> {
        ractor::call!(self.actor, DbWorkerMessage::Transaction, statements).map_err(|e| {
            CastorError::RactorError(format!("DbWorker Transaction RPC failed: {e}"))
        })?
    }

    async fn close(&self) -> Result<(), CastorError> {
        ractor::call!(self.actor, DbWorkerMessage::Close)
            .map_err(|e| CastorError::RactorError(format!("DbWorker Close RPC failed: {e}")))?
    }
}

struct DbWorkerArgs {
    storage: StorageTarget,
    artifacts: EngineArtifacts,
    lock: AdvisoryLock,
}

struct DbWorkerState {
    pool: SqlitePool,
    lock: Option<AdvisoryLock>,
}

struct DbWorker;

#[ractor::async_trait]
impl Actor for DbWorker {
    type Msg = DbWorkerMessage;
    type State = DbWorkerState;
    type Arguments = DbWorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let pool = sqlite::open_pool(&args.storage, &args.artifacts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("engine open failed: {e}")))?;

        info!(storage = %args.storage.describe(), "DbWorker initialized");
        Ok(DbWorkerState {
            pool,
            lock: Some(args.lock),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DbWorkerMessage::Query(sql, params, reply) => {
                let res = sqlite::query(&state.pool, &sql, &params).await;
                let _ = reply.send(res);
            }
            DbWorkerMessage::Execute(sql, params, reply) => {
                let res = sqlite::execute(&state.pool, &sql, &params).await;
                let _ = reply.send(res);
            }
            DbWorkerMessage::Transaction(statements, reply) => {
                let res = sqlite::transaction(&state.pool, &statements).await;
                let _ = reply.send(res);
            }
            DbWorkerMessage::Close(reply) => {
                state.pool.close().await;
                state.lock.take();
                myself.stop(Some("closed".to_string()));
                let _ = reply.send(Ok(()));
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if !state.pool.is_closed() {
            warn!("DbWorker stopped without Close; closing pool");
            state.pool.close().await;
        }
        Ok(())
    }
}

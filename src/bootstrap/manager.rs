use super::callbacks::BootstrapCallbacks;
use super::diagnostics::ErrorDiagnostics;
use super::passthrough::DatabasePassthrough;
use super::state::LoadingState;
use super::teardown;
use crate::config::{Config, ExecutionConfig};
use crate::engine::{
    Capabilities, DatabaseHandle, EngineArtifacts, StorageTarget, select_strategy, strategy_for,
};
use crate::error::{CastorError, SharedError};
use crate::loader::{
    ArtifactPlan, ArtifactSource, HttpArtifactSource, load_binary, load_dependencies,
};
use crate::migration::{
    JOURNAL_TABLE, KvStore, MigrationDefinition, MigrationOutcome, Migrator, kv_store_for,
};
use crate::utils::logging::with_pretty_json_debug;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::{
    Arc, Mutex, OnceLock, PoisonError,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

type InitFuture = Shared<BoxFuture<'static, Result<DatabaseHandle, SharedError>>>;

/// Owns the process's single database handle and the bootstrap that produces it.
///
/// Cloning is cheap and shares the same manager.
#[derive(Clone)]
pub struct DatabaseManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    source: Arc<dyn ArtifactSource>,
    plan: ArtifactPlan,
    capabilities: Capabilities,
    storage: StorageTarget,
    execution: ExecutionConfig,
    kv: Arc<dyn KvStore>,
    migrator: Migrator,
    handle: OnceLock<DatabaseHandle>,
    in_flight: Mutex<Option<InitFuture>>,
    state: watch::Sender<LoadingState>,
    attempts: AtomicU64,
    last_migration: Mutex<Option<MigrationOutcome>>,
}

/// A failed attempt, plus the engine instance if one was already created.
struct Failure {
    error: CastorError,
    handle: Option<DatabaseHandle>,
}

impl From<CastorError> for Failure {
    fn from(error: CastorError) -> Self {
        Self {
            error,
            handle: None,
        }
    }
}

static SHARED: Mutex<Option<DatabaseManager>> = Mutex::new(None);

/// Process-wide manager built from `cfg` on first use.
///
/// Later calls return the same manager and ignore `cfg`. Construction runs under
/// the lock.
pub fn shared_manager(cfg: &Config) -> Result<DatabaseManager, CastorError> {
    let mut shared = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(manager) = shared.as_ref() {
        return Ok(manager.clone());
    }
    let manager = DatabaseManager::from_config(cfg)?;
    *shared = Some(manager.clone());
    Ok(manager)
}

impl DatabaseManager {
    /// Builds a manager over explicit collaborators.
    pub fn new(
        cfg: &Config,
        capabilities: Capabilities,
        source: Arc<dyn ArtifactSource>,
        migrations: Vec<MigrationDefinition>,
    ) -> Self {
        let storage = StorageTarget::resolve(&cfg.storage, &capabilities);
        let kv = kv_store_for(&storage);
        let (state, _) = watch::channel(LoadingState::Initializing);

        Self {
            inner: Arc::new(ManagerInner {
                source,
                plan: ArtifactPlan::from(&cfg.artifacts),
                capabilities,
                storage,
                execution: cfg.execution.clone(),
                kv: kv.clone(),
                migrator: Migrator::new(migrations, kv),
                handle: OnceLock::new(),
                in_flight: Mutex::new(None),
                state,
                attempts: AtomicU64::new(0),
                last_migration: Mutex::new(None),
            }),
        }
    }

    /// Detects capabilities, fetches artifacts over HTTP and uses the bundled migrations.
    pub fn from_config(cfg: &Config) -> Result<Self, CastorError> {
        let capabilities = Capabilities::detect(cfg);
        let source = Arc::new(HttpArtifactSource::new(&cfg.artifacts)?);
        info!(
            background_context = capabilities.background_context,
            advisory_lock = capabilities.advisory_lock,
            durable_storage = capabilities.durable_storage,
            "Runtime capabilities resolved"
        );
        Ok(Self::new(
            cfg,
            capabilities,
            source,
            castor_schema::bundled_migrations(),
        ))
    }

    /// Returns the ready handle, joining or starting the bootstrap as needed.
    ///
    /// Concurrent callers share one attempt and observe the same result. A failed
    /// attempt is forgotten, so the next call starts over. Callbacks only apply when
    /// this call starts the attempt.
    pub async fn initialize(
        &self,
        callbacks: BootstrapCallbacks,
    ) -> Result<DatabaseHandle, SharedError> {
        if let Some(handle) = self.inner.handle.get() {
            return Ok(handle.clone());
        }

        let attempt = {
            let mut in_flight = self.inner.lock_in_flight();
            if let Some(handle) = self.inner.handle.get() {
                return Ok(handle.clone());
            }
            match in_flight.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight bootstrap");
                    pending.clone()
                }
                None => {
                    let fresh = self.start_attempt(callbacks);
                    *in_flight = Some(fresh.clone());
                    fresh
                }
            }
        };

        attempt.await
    }

    /// The ready handle, or `NotInitialized` before the first successful bootstrap.
    pub fn handle(&self) -> Result<DatabaseHandle, CastorError> {
        self.inner
            .handle
            .get()
            .cloned()
            .ok_or(CastorError::NotInitialized)
    }

    /// A forwarding client that can be held before the handle exists.
    pub fn passthrough(&self) -> DatabasePassthrough {
        DatabasePassthrough::new(self.clone())
    }

    /// True when both values share one underlying manager.
    pub fn same_manager(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn state(&self) -> LoadingState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LoadingState> {
        self.inner.state.subscribe()
    }

    pub fn state_stream(&self) -> WatchStream<LoadingState> {
        WatchStream::new(self.subscribe_state())
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    pub fn storage(&self) -> &StorageTarget {
        &self.inner.storage
    }

    pub fn last_migration_outcome(&self) -> Option<MigrationOutcome> {
        *self
            .inner
            .last_migration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Deletes persisted storage and the cached schema hash. Never fails.
    pub async fn reset_database(&self) {
        teardown::reset_database(&self.inner.storage, self.inner.kv.as_ref()).await;
    }

    /// Appends a manual journal entry for `hash`, then re-runs `initialize()`.
    pub async fn update_migration_record(&self, hash: &str) -> Result<(), SharedError> {
        let handle = self.handle().map_err(Arc::new)?;
        let created_at = chrono::Utc::now().timestamp_millis();
        handle
            .execute(
                &format!("INSERT INTO {JOURNAL_TABLE} (hash, created_at) VALUES (?, ?)"),
                vec![Value::from(hash), Value::from(created_at)],
            )
            .await
            .map_err(Arc::new)?;
        info!(hash, created_at, "Manual migration record added");

        self.initialize(BootstrapCallbacks::default()).await?;
        Ok(())
    }

    fn start_attempt(&self, callbacks: BootstrapCallbacks) -> InitFuture {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run_attempt(attempt, callbacks).await });

        let inner = self.inner.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => {
                    inner.state.send_replace(LoadingState::Error);
                    inner.clear_in_flight();
                    error!(attempt, error = %join_err, "Bootstrap task aborted");
                    Err(Arc::new(CastorError::UnexpectedError(format!(
                        "bootstrap task aborted: {join_err}"
                    ))))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl ManagerInner {
    async fn run_attempt(
        &self,
        attempt: u64,
        callbacks: BootstrapCallbacks,
    ) -> Result<DatabaseHandle, SharedError> {
        info!(attempt, storage = %self.storage.describe(), "Database bootstrap started");

        match self.bootstrap(&callbacks).await {
            Ok(handle) => {
                self.clear_in_flight();
                Ok(handle)
            }
            Err(Failure { error, handle }) => {
                self.set_state(LoadingState::Error, &callbacks);
                self.clear_in_flight();

                let diagnostics =
                    ErrorDiagnostics::collect(&error, handle.as_ref(), self.migrator.migrations())
                        .await;
                error!(
                    attempt,
                    kind = diagnostics.error.name.as_str(),
                    error = %error,
                    journal_rows = diagnostics.migration_table_items.len(),
                    "Database bootstrap failed"
                );
                with_pretty_json_debug(&diagnostics, |json| {
                    debug!(attempt, diagnostics = json, "Bootstrap failure diagnostics");
                });
                callbacks.failed(&diagnostics);

                // Release the half-built instance so a retry can take its lock.
                if let Some(handle) = handle
                    && let Err(e) = handle.close().await
                {
                    warn!(error = %e, "Failed to close engine after bootstrap failure");
                }
                Err(Arc::new(error))
            }
        }
    }

    async fn bootstrap(&self, callbacks: &BootstrapCallbacks) -> Result<DatabaseHandle, Failure> {
        self.set_state(LoadingState::Initializing, callbacks);
        self.set_state(LoadingState::LoadingDependencies, callbacks);
        self.set_state(LoadingState::LoadingWasm, callbacks);

        let (module, dependencies) = tokio::try_join!(
            load_binary(
                self.source.as_ref(),
                &self.plan.engine,
                &self.plan.engine_expectation,
                callbacks.on_progress.clone(),
            ),
            load_dependencies(
                self.source.as_ref(),
                &self.plan,
                callbacks.on_progress.clone()
            ),
        )?;

        let strategy = strategy_for(select_strategy(&self.capabilities), &self.execution);
        debug!(mode = ?strategy.mode(), "Execution strategy selected");
        let handle = strategy
            .instantiate(
                &self.storage,
                EngineArtifacts {
                    module,
                    dependencies,
                },
            )
            .await?;

        self.set_state(LoadingState::Migrating, callbacks);
        let outcome = match self.migrator.migrate(&handle, true).await {
            Ok(outcome) => outcome,
            Err(error) => {
                return Err(Failure {
                    error,
                    handle: Some(handle),
                });
            }
        };
        *self
            .last_migration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome);

        self.set_state(LoadingState::Finished, callbacks);
        if self.execution.ready_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.execution.ready_delay_ms)).await;
        }

        // Publish before announcing Ready so observers can use the handle immediately.
        if self.handle.set(handle.clone()).is_err() {
            warn!("Database handle already published; keeping the first instance");
        }
        self.set_state(LoadingState::Ready, callbacks);
        info!(mode = ?handle.mode(), outcome = ?outcome, "Database ready");
        Ok(handle)
    }

    fn set_state(&self, state: LoadingState, callbacks: &BootstrapCallbacks) {
        self.state.send_replace(state);
        debug!(state = ?state, "Loading state changed");
        callbacks.state_changed(state);
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Option<InitFuture>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_in_flight(&self) {
        self.lock_in_flight().take();
    }
}

use super::journal::{CREATE_JOURNAL_SQL, INSERT_JOURNAL_SQL, JOURNAL_TABLE, latest_record};
use super::kv::{KvStore, SCHEMA_HASH_KEY};
use crate::engine::{DatabaseHandle, Statement};
use crate::error::CastorError;
use castor_schema::{MigrationDefinition, schema_hash};
use serde::Serialize;
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info, warn};

/// What a migration pass ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MigrationOutcome {
    /// This process already synced the schema; nothing was checked.
    AlreadySynced,
    /// Cached digest matched and the store holds schema objects.
    FastPath,
    /// The migration set ran; `applied` journal entries were added.
    Applied { applied: usize },
}

pub struct Migrator {
    migrations: Arc<[MigrationDefinition]>,
    kv: Arc<dyn KvStore>,
    synced: AtomicBool,
}

impl Migrator {
    pub fn new(migrations: Vec<MigrationDefinition>, kv: Arc<dyn KvStore>) -> Self {
        Self {
            migrations: migrations.into(),
            kv,
            synced: AtomicBool::new(false),
        }
    }

    pub fn migrations(&self) -> &[MigrationDefinition] {
        &self.migrations
    }

    pub fn current_hash(&self) -> String {
        schema_hash(&self.migrations)
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Brings the store behind `handle` up to the bundled migration set.
    ///
    /// Only a failed migration run is an error; cache reads and the existence
    /// probe fall back to a full run when they fail.
    pub async fn migrate(
        &self,
        handle: &DatabaseHandle,
        skip_if_synced: bool,
    ) -> Result<MigrationOutcome, CastorError> {
        if skip_if_synced && self.is_synced() {
            return Ok(MigrationOutcome::AlreadySynced);
        }

        let current_hash = self.current_hash();
        let cached_hash = match self.kv.get(SCHEMA_HASH_KEY).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to read cached schema hash; treating as miss");
                None
            }
        };

        if cached_hash.as_deref() == Some(current_hash.as_str()) {
            match count_schema_tables(handle).await {
                Ok(count) if count > 0 => {
                    info!(
                        hash = %current_hash,
                        tables = count,
                        "Schema hash unchanged; skipping migrations"
                    );
                    self.synced.store(true, Ordering::Release);
                    return Ok(MigrationOutcome::FastPath);
                }
                Ok(_) => {
                    warn!("Schema hash matches but store has no tables; running migrations");
                }
                Err(e) => {
                    warn!(error = %e, "Schema existence check failed; running migrations");
                }
            }
        } else {
            debug!(
                cached = cached_hash.as_deref().unwrap_or("<none>"),
                current = %current_hash,
                "Schema hash changed"
            );
        }

        let applied = self
            .apply(handle)
            .await
            .map_err(|e| CastorError::MigrationExecution {
                source: Box::new(e),
            })?;

        if let Err(e) = self.kv.set(SCHEMA_HASH_KEY, &current_hash).await {
            warn!(error = %e, "Failed to persist schema hash; next start will re-check");
        }
        self.synced.store(true, Ordering::Release);
        info!(hash = %current_hash, applied, "Migrations complete");
        Ok(MigrationOutcome::Applied { applied })
    }

    /// Applies every migration newer than the journal's latest entry in one transaction.
    async fn apply(&self, handle: &DatabaseHandle) -> Result<usize, CastorError> {
        handle.execute(CREATE_JOURNAL_SQL, Vec::new()).await?;
        let last_applied = latest_record(handle).await?.map(|r| r.created_at);

        let pending: Vec<&MigrationDefinition> = self
            .migrations
            .iter()
            .filter(|m| last_applied.is_none_or(|last| m.folder_millis > last))
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let mut statements = Vec::new();
        for migration in &pending {
            debug!(tag = %migration.tag, statements = migration.sql.len(), "Applying migration");
            statements.extend(migration.sql.iter().map(Statement::new));
            statements.push(Statement::with_params(
                INSERT_JOURNAL_SQL,
                vec![
                    Value::from(migration.hash.clone()),
                    Value::from(migration.folder_millis),
                ],
            ));
        }
        handle.transaction(statements).await?;
        Ok(pending.len())
    }
}

async fn count_schema_tables(handle: &DatabaseHandle) -> Result<i64, CastorError> {
    let rows = handle
        .query(
            "SELECT COUNT(*) AS count FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ?",
            vec![Value::from(JOURNAL_TABLE)],
        )
        .await?;
    Ok(rows
        .first()
        .and_then(|row| row.get("count"))
        .and_then(Value::as_i64)
        .unwrap_or(0))
}

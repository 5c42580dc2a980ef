//! SQLite operations shared by the in-process client and the worker actor.

use super::EngineArtifacts;
use super::handle::{Row, Statement};
use super::storage::StorageTarget;
use crate::error::CastorError;
use crate::utils::fs::atomic_write_async;
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Column, Row as _, SqlitePool, TypeInfo, ValueRef};
use std::{path::Path, str::FromStr, time::Duration};
use tracing::{debug, info};

/// First bytes of every SQLite database file.
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// Opens the engine's pool on `storage`, seeding and extending it from `artifacts`.
pub(crate) async fn open_pool(
    storage: &StorageTarget,
    artifacts: &EngineArtifacts,
) -> Result<SqlitePool, CastorError> {
    artifacts.validate()?;

    let (mut connect_opts, pool_opts) = match storage.database_path() {
        Some(path) => {
            if let Some(dir) = path.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            seed_from_bundle(&path, &artifacts.dependencies.fs_bundle.bytes).await?;

            let opts = SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
            (opts, SqlitePoolOptions::new())
        }
        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        None => (
            SqliteConnectOptions::from_str("sqlite::memory:")?,
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        ),
    };

    if let Some(vector) = artifacts.dependencies.vector_ext.as_ref() {
        // Replaced via rename so pools that already mapped the old file keep their copy.
        let path = storage.extensions_dir().join(&vector.name);
        atomic_write_async(path.clone(), vector.bytes.clone()).await?;
        connect_opts = connect_opts.extension(path.to_string_lossy().into_owned());
        debug!(extension = %path.display(), "Vector extension registered");
    }

    let pool = pool_opts.connect_with(connect_opts).await?;
    info!(
        storage = %storage.describe(),
        module = %artifacts.module.name(),
        backend = %artifacts.dependencies.backend.name,
        "Engine instance opened"
    );
    Ok(pool)
}

/// Writes the filesystem bundle as the initial database when it is a SQLite
/// image and no database exists yet.
async fn seed_from_bundle(path: &Path, bundle: &[u8]) -> Result<(), CastorError> {
    if !bundle.starts_with(SQLITE_HEADER) || tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    atomic_write_async(path.to_path_buf(), bundle.to_vec()).await?;
    info!(path = %path.display(), size = bundle.len(), "Seeded database from filesystem bundle");
    Ok(())
}

pub(crate) async fn query(
    pool: &SqlitePool,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Row>, CastorError> {
    let rows = bind_all(sqlx::query(sql), params).fetch_all(pool).await?;
    rows.iter().map(row_to_json).collect()
}

pub(crate) async fn execute(
    pool: &SqlitePool,
    sql: &str,
    params: &[Value],
) -> Result<u64, CastorError> {
    let res = bind_all(sqlx::query(sql), params).execute(pool).await?;
    Ok(res.rows_affected())
}

pub(crate) async fn transaction(
    pool: &SqlitePool,
    statements: &[Statement],
) -> Result<(), CastorError> {
    let mut tx = pool.begin().await?;
    for stmt in statements {
        bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn row_to_json(row: &SqliteRow) -> Result<Row, CastorError> {
    let mut out = Map::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get_unchecked::<i64, _>(idx)?),
                "REAL" => Value::from(row.try_get_unchecked::<f64, _>(idx)?),
                "BLOB" => Value::from(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
                _ => Value::String(row.try_get_unchecked::<String, _>(idx)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

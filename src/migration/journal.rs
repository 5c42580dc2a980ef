use crate::engine::DatabaseHandle;
use crate::error::CastorError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Table recording every applied migration.
pub const JOURNAL_TABLE: &str = "__castor_migrations";

pub(crate) const CREATE_JOURNAL_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS __castor_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

pub(crate) const INSERT_JOURNAL_SQL: &str =
    "INSERT INTO __castor_migrations (hash, created_at) VALUES (?, ?)";

/// One applied migration as recorded in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub id: i64,
    pub hash: String,
    /// Milliseconds since epoch.
    #[serde(alias = "created_at")]
    pub created_at: i64,
}

/// All journal rows, oldest first.
pub async fn read_journal(handle: &DatabaseHandle) -> Result<Vec<MigrationRecord>, CastorError> {
    let rows = handle
        .query(
            "SELECT id, hash, created_at FROM __castor_migrations ORDER BY created_at, id",
            Vec::new(),
        )
        .await?;
    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<MigrationRecord>(Value::Object(row)).map_err(CastorError::from)
        })
        .collect()
}

pub(crate) async fn latest_record(
    handle: &DatabaseHandle,
) -> Result<Option<MigrationRecord>, CastorError> {
    let rows = handle
        .query(
            "SELECT id, hash, created_at FROM __castor_migrations ORDER BY created_at DESC, id DESC LIMIT 1",
            Vec::new(),
        )
        .await?;
    rows.into_iter()
        .next()
        .map(|row| {
            serde_json::from_value::<MigrationRecord>(Value::Object(row)).map_err(CastorError::from)
        })
        .transpose()
}

use crate::engine::DatabaseHandle;
use crate::error::{CastorError, ErrorInfo};
use crate::migration::{MigrationDefinition, MigrationRecord, read_journal};
use serde::Serialize;
use tracing::debug;

/// Everything known about a failed bootstrap attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDiagnostics {
    pub error: ErrorInfo,
    /// Journal rows; empty when no engine instance exists or the journal cannot be read.
    pub migration_table_items: Vec<MigrationRecord>,
    pub migrations_sql: Vec<MigrationDefinition>,
}

impl ErrorDiagnostics {
    pub(crate) async fn collect(
        error: &CastorError,
        handle: Option<&DatabaseHandle>,
        migrations: &[MigrationDefinition],
    ) -> Self {
        let migration_table_items = match handle {
            Some(handle) => read_journal(handle).await.unwrap_or_else(|e| {
                debug!(error = %e, "Migration journal unavailable for diagnostics");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Self {
            error: ErrorInfo::from(error),
            migration_table_items,
            migrations_sql: migrations.to_vec(),
        }
    }
}

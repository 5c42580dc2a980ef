use serde::Serialize;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Message returned by every handle access before the database is ready.
pub const NOT_INITIALIZED_MESSAGE: &str = "Database not initialized. Please call initialize() first.";

#[derive(Debug, ThisError)]
pub enum CastorError {
    #[error("Transport error loading `{artifact}`: {message}")]
    Transport { artifact: String, message: String },

    #[error("Engine module failed to compile: {0}")]
    Compile(String),

    #[error("Dependency `{artifact}` failed to load: {message}")]
    DependencyLoad { artifact: String, message: String },

    #[error("Migration failed: {source}")]
    MigrationExecution {
        #[source]
        source: Box<CastorError>,
    },

    #[error("{}", NOT_INITIALIZED_MESSAGE)]
    NotInitialized,

    #[error("Timed out waiting for advisory lock at {path}")]
    LockTimeout { path: String },

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

/// Error shared by every caller waiting on the same bootstrap attempt.
pub type SharedError = Arc<CastorError>;

impl CastorError {
    /// Stable name of the error class, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            CastorError::Transport { .. } | CastorError::ReqwestError(_) => "TransportError",
            CastorError::Compile(_) => "CompileError",
            CastorError::DependencyLoad { .. } => "DependencyLoadError",
            CastorError::MigrationExecution { .. } => "MigrationExecutionError",
            CastorError::NotInitialized => "NotInitializedError",
            CastorError::LockTimeout { .. } => "LockTimeoutError",
            CastorError::JsonError(_) => "JsonError",
            CastorError::IoError(_) => "IoError",
            CastorError::UrlError(_) => "UrlError",
            CastorError::RactorError(_) => "RactorError",
            CastorError::DatabaseError(_) => "DatabaseError",
            CastorError::UnexpectedError(_) => "UnexpectedError",
        }
    }

    pub(crate) fn transport(artifact: &str, message: impl ToString) -> Self {
        CastorError::Transport {
            artifact: artifact.to_string(),
            message: message.to_string(),
        }
    }
}

/// Serializable view of an error: class name, message and source chain.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    /// Source chain, outermost first; `None` when the error has no source.
    pub stack: Option<String>,
}

impl From<&CastorError> for ErrorInfo {
    fn from(err: &CastorError) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(inner) = source {
            chain.push(inner.to_string());
            source = inner.source();
        }

        Self {
            name: err.kind().to_string(),
            message: err.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_initialized_message_is_exact() {
        assert_eq!(
            CastorError::NotInitialized.to_string(),
            "Database not initialized. Please call initialize() first."
        );
    }

    #[test]
    fn error_info_collects_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CastorError::from(io);
        let info = ErrorInfo::from(&err);

        assert_eq!(info.name, "IoError");
        assert_eq!(info.message, "IO error: denied");
        assert_eq!(info.stack.as_deref(), Some("denied"));
    }

    #[test]
    fn error_info_without_source_has_no_stack() {
        let info = ErrorInfo::from(&CastorError::Compile("bad magic".to_string()));
        assert_eq!(info.name, "CompileError");
        assert!(info.stack.is_none());
    }

    #[test]
    fn migration_failure_keeps_its_cause() {
        let cause = std::io::Error::other("disk full");
        let err = CastorError::MigrationExecution {
            source: Box::new(CastorError::from(cause)),
        };
        let info = ErrorInfo::from(&err);

        assert_eq!(info.name, "MigrationExecutionError");
        assert_eq!(info.message, "Migration failed: IO error: disk full");
        assert_eq!(info.stack.as_deref(), Some("IO error: disk full\ndisk full"));
    }
}

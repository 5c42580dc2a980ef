use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Marker separating statements inside one migration file.
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// One migration as it is applied: an ordered list of statements plus the
/// journal metadata recorded once it succeeds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationDefinition {
    pub tag: String,
    /// Creation time of the migration (ms since epoch); the journal orders by it.
    pub folder_millis: i64,
    /// SHA-256 of the raw migration file.
    pub hash: String,
    pub breakpoints: bool,
    pub sql: Vec<String>,
}

impl MigrationDefinition {
    /// Builds a definition from the raw contents of a migration file.
    pub fn from_source(tag: impl Into<String>, folder_millis: i64, source: &str) -> Self {
        let breakpoints = source.contains(STATEMENT_BREAKPOINT);
        let sql = source
            .split(STATEMENT_BREAKPOINT)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            tag: tag.into(),
            folder_millis,
            hash: sha256_hex(source.as_bytes()),
            breakpoints,
            sql,
        }
    }
}

/// Digest over the full ordered migration set.
///
/// Any change to a statement, its order, or the journal metadata changes the hash.
pub fn schema_hash(migrations: &[MigrationDefinition]) -> String {
    let encoded = serde_json::to_vec(migrations).unwrap_or_default();
    sha256_hex(&encoded)
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_source_splits_on_breakpoints() {
        let src = "CREATE TABLE a (id INTEGER);\n\
                   --> statement-breakpoint\n\
                   CREATE TABLE b (id INTEGER);\n";
        let m = MigrationDefinition::from_source("0000_init", 1, src);

        assert!(m.breakpoints);
        assert_eq!(
            m.sql,
            vec![
                "CREATE TABLE a (id INTEGER);".to_string(),
                "CREATE TABLE b (id INTEGER);".to_string()
            ]
        );
        assert_eq!(m.hash.len(), 64);
    }

    #[test]
    fn schema_hash_depends_on_order() {
        let a = MigrationDefinition::from_source("a", 1, "CREATE TABLE a (id INTEGER);");
        let b = MigrationDefinition::from_source("b", 2, "CREATE TABLE b (id INTEGER);");

        let forward = schema_hash(&[a.clone(), b.clone()]);
        let reversed = schema_hash(&[b, a.clone()]);

        assert_ne!(forward, reversed);
        let b_again = MigrationDefinition::from_source("b", 2, "CREATE TABLE b (id INTEGER);");
        assert_eq!(forward, schema_hash(&[a, b_again]));
    }

    #[test]
    fn schema_hash_of_empty_set_is_stable() {
        assert_eq!(schema_hash(&[]), schema_hash(&[]));
    }
}

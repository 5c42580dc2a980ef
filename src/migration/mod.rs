//! Hash-gated schema migration.
//!
//! The digest of the full migration set is cached in a [`KvStore`]; when it
//! matches and the store already holds schema objects, the migration run is
//! skipped entirely.

mod journal;
mod kv;
mod migrator;

pub use castor_schema::MigrationDefinition;
pub use journal::{JOURNAL_TABLE, MigrationRecord, read_journal};
pub use kv::{FileKvStore, KvStore, MemoryKvStore, SCHEMA_HASH_KEY, kv_store_for};
pub use migrator::{MigrationOutcome, Migrator};

//! Migration definitions shipped with castor.
//!
//! The SQL lives under `migrations/` and is compiled into the crate; the
//! bootstrap side only sees the ordered [`MigrationDefinition`] list and its
//! [`schema_hash`].

mod bundled;
mod migration;

pub use bundled::bundled_migrations;
pub use migration::{MigrationDefinition, STATEMENT_BREAKPOINT, schema_hash};

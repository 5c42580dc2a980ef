//! Bootstrap orchestration: one [`DatabaseManager`] per process turns loaded
//! artifacts into a migrated, ready [`DatabaseHandle`](crate::engine::DatabaseHandle).

mod callbacks;
mod diagnostics;
mod manager;
mod passthrough;
mod state;
mod teardown;

pub use callbacks::BootstrapCallbacks;
pub use diagnostics::ErrorDiagnostics;
pub use manager::{DatabaseManager, shared_manager};
pub use passthrough::DatabasePassthrough;
pub use state::LoadingState;
pub use teardown::reset_database;

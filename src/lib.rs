pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod migration;
mod utils;

pub use bootstrap::{
    BootstrapCallbacks, DatabaseManager, DatabasePassthrough, ErrorDiagnostics, LoadingState,
    shared_manager,
};
pub use engine::{DatabaseClient, DatabaseHandle, ExecutionMode};
pub use error::{CastorError, SharedError};
pub use loader::{ProgressEvent, ProgressPhase};

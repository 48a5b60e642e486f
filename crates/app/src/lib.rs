// Library exports for the CLI binary and integration tests

/// SQLite-backed registry ledger
pub mod database;
/// Tracing subscriber setup
pub mod logging;
/// The on-disk state directory and its config
pub mod state;

pub use database::{Database, DatabaseLedgerError, DatabaseSetupError};
pub use state::{AppConfig, AppState, BlobStoreConfig, SealboxPipeline, StateError};

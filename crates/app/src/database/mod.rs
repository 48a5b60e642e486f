mod ledger;
mod sqlite;

use std::ops::Deref;
use std::path::Path;

use sqlx::SqlitePool;

pub use ledger::DatabaseLedgerError;

/// SQLite-backed registry ledger
#[derive(Clone, Debug)]
pub struct Database(SqlitePool);

impl Database {
    /// Open (creating if missing) and migrate the database at `path`
    pub async fn connect(path: &Path) -> Result<Self, DatabaseSetupError> {
        let db = sqlite::connect_sqlite(path).await?;
        sqlite::migrate_sqlite(&db).await?;
        Ok(Database::new(db))
    }

    /// A private in-memory database, gone when dropped
    pub async fn memory() -> Result<Self, DatabaseSetupError> {
        let db = sqlite::connect_sqlite_memory().await?;
        sqlite::migrate_sqlite(&db).await?;
        Ok(Database::new(db))
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self(pool)
    }
}

impl Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseSetupError {
    #[error("error occurred while attempting database migration: {0}")]
    MigrationFailed(sqlx::migrate::MigrateError),

    #[error("unable to perform initial connection and check of the database: {0}")]
    Unavailable(sqlx::Error),
}

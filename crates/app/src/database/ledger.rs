use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::crypto::{SealedHandle, VaultError};
use common::identity::Identity;
use common::registry::{File, FileId, FileLedger, LedgerError};

use super::Database;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseLedgerError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("stored handle is unreadable: {0}")]
    Handle(#[from] VaultError),
}

fn provider<E: Into<DatabaseLedgerError>>(err: E) -> LedgerError<DatabaseLedgerError> {
    LedgerError::Provider(err.into())
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: i64,
    owner: String,
    locator: Vec<u8>,
    file_key: Vec<u8>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct GrantRow {
    grantee: String,
    granted_at: DateTime<Utc>,
}

impl Database {
    async fn owner_of(&self, id: FileId) -> Result<String, LedgerError<DatabaseLedgerError>> {
        let owner: Option<String> = sqlx::query_scalar("SELECT owner FROM files WHERE id = ?1")
            .bind(id as i64)
            .fetch_optional(&**self)
            .await
            .map_err(provider)?;
        owner.ok_or(LedgerError::FileNotFound(id))
    }
}

#[async_trait]
impl FileLedger for Database {
    type Error = DatabaseLedgerError;

    async fn insert(
        &self,
        owner: &Identity,
        locator: SealedHandle,
        key: SealedHandle,
        created_at: DateTime<Utc>,
    ) -> Result<FileId, LedgerError<Self::Error>> {
        let locator = locator.to_bytes().map_err(provider)?;
        let key = key.to_bytes().map_err(provider)?;

        let result = sqlx::query(
            r#"
            INSERT INTO files (owner, locator, file_key, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(owner.as_str())
        .bind(locator)
        .bind(key)
        .bind(created_at)
        .execute(&**self)
        .await
        .map_err(provider)?;

        Ok(result.last_insert_rowid() as FileId)
    }

    async fn file(&self, id: FileId) -> Result<Option<File>, LedgerError<Self::Error>> {
        // one read transaction so the grantee set matches the file row
        let mut tx = self.begin().await.map_err(provider)?;

        let row: Option<FileRow> = sqlx::query_as(
            r#"
            SELECT id, owner, locator, file_key, created_at
            FROM files
            WHERE id = ?1
            "#,
        )
        .bind(id as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(provider)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let grants: Vec<GrantRow> = sqlx::query_as(
            r#"
            SELECT grantee, granted_at
            FROM grants
            WHERE file_id = ?1
            "#,
        )
        .bind(id as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(provider)?;

        tx.commit().await.map_err(provider)?;

        let file = File::new(
            row.id as FileId,
            Identity::new(row.owner),
            SealedHandle::from_bytes(&row.locator).map_err(provider)?,
            SealedHandle::from_bytes(&row.file_key).map_err(provider)?,
            row.created_at,
        )
        .with_grantees(
            grants
                .into_iter()
                .map(|g| (Identity::new(g.grantee), g.granted_at)),
        );
        Ok(Some(file))
    }

    async fn add_grantee(
        &self,
        id: FileId,
        grantee: &Identity,
        granted_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError<Self::Error>> {
        let owner = self.owner_of(id).await?;
        if owner == grantee.as_str() {
            return Ok(false);
        }

        // UNIQUE(file_id, grantee) makes check-and-insert a single step
        let result = sqlx::query(
            r#"
            INSERT INTO grants (file_id, grantee, granted_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (file_id, grantee) DO NOTHING
            "#,
        )
        .bind(id as i64)
        .bind(grantee.as_str())
        .bind(granted_at)
        .execute(&**self)
        .await
        .map_err(provider)?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_grantee(
        &self,
        id: FileId,
        grantee: &Identity,
    ) -> Result<bool, LedgerError<Self::Error>> {
        self.owner_of(id).await?;

        let result = sqlx::query("DELETE FROM grants WHERE file_id = ?1 AND grantee = ?2")
            .bind(id as i64)
            .bind(grantee.as_str())
            .execute(&**self)
            .await
            .map_err(provider)?;

        Ok(result.rows_affected() == 1)
    }

    async fn owned_by(&self, owner: &Identity) -> Result<Vec<FileId>, LedgerError<Self::Error>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM files WHERE owner = ?1 ORDER BY id")
            .bind(owner.as_str())
            .fetch_all(&**self)
            .await
            .map_err(provider)?;
        Ok(ids.into_iter().map(|id| id as FileId).collect())
    }

    async fn latest_id(&self) -> Result<Option<FileId>, LedgerError<Self::Error>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM files")
            .fetch_one(&**self)
            .await
            .map_err(provider)?;
        Ok(id.map(|id| id as FileId))
    }
}

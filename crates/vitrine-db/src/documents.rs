//! Document repository: load/save, candidate listing, scopes and edit rights.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use vitrine_core::{Document, DocumentStore, EditPermission, Error, Result, ScopeOption};

/// PostgreSQL implementation of [`DocumentStore`] and [`EditPermission`].
///
/// A document may be edited when it exists and is not locked.
#[derive(Debug, Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a document and return its id.
    pub async fn insert(&self, title: &str, body: &str, scope: Option<&str>) -> Result<i64> {
        let row = sqlx::query("INSERT INTO document (title, body, scope) VALUES ($1, $2, $3) RETURNING id")
            .bind(title)
            .bind(body)
            .bind(scope)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("id"))
    }

    /// Register a scope; an existing scope keeps its value and takes the new label.
    pub async fn upsert_scope(&self, value: &str, label: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO document_scope (value, label) VALUES ($1, $2)
             ON CONFLICT (value) DO UPDATE SET label = EXCLUDED.label",
        )
        .bind(value)
        .bind(label)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn set_locked(&self, document_id: i64, locked: bool) -> Result<()> {
        let result = sqlx::query("UPDATE document SET locked = $2 WHERE id = $1")
            .bind(document_id)
            .bind(locked)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(document_id));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentRepository {
    async fn load(&self, document_id: i64) -> Result<Document> {
        let row = sqlx::query("SELECT id, title, body FROM document WHERE id = $1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::DocumentNotFound(document_id))?;

        Ok(Document {
            id: row.get("id"),
            title: row.get("title"),
            text: row.get("body"),
        })
    }

    async fn save(&self, document_id: i64, text: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE document SET body = $2, updated_at_utc = NOW() WHERE id = $1")
                .bind(document_id)
                .bind(text)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(document_id));
        }
        Ok(())
    }

    async fn list_candidates(&self, scope: Option<&str>) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT id FROM document WHERE ($1::TEXT IS NULL OR scope = $1) ORDER BY id",
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn list_scopes(&self) -> Result<Vec<ScopeOption>> {
        let rows = sqlx::query("SELECT value, label FROM document_scope ORDER BY value")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|r| ScopeOption {
                value: r.get("value"),
                label: r.get("label"),
            })
            .collect())
    }
}

#[async_trait]
impl EditPermission for PgDocumentRepository {
    async fn can_edit(&self, document_id: i64) -> Result<bool> {
        let locked: Option<bool> = sqlx::query_scalar("SELECT locked FROM document WHERE id = $1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(matches!(locked, Some(false)))
    }
}

//! Photo repository
//!
//! Database operations for company photo records. File contents live in
//! photo storage; this table maps public URLs to storage paths and owners.

use crate::db::{Backend, DynDatabasePool};
use crate::models::CompanyPhoto;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Photo repository trait
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Record a stored photo
    async fn create(&self, photo: &CompanyPhoto) -> Result<CompanyPhoto>;

    /// All photos of a company, oldest first
    async fn list_by_company(&self, company_id: i64) -> Result<Vec<CompanyPhoto>>;

    /// Photos of `company_id` whose public path is in `public_paths`.
    ///
    /// Paths owned by other companies are not returned.
    async fn find_by_public_paths(
        &self,
        company_id: i64,
        public_paths: &[String],
    ) -> Result<Vec<CompanyPhoto>>;

    /// Delete one photo record of a company
    async fn delete(&self, company_id: i64, id: i64) -> Result<bool>;
}

/// SQLx-based photo repository implementation
pub struct SqlxPhotoRepository {
    pool: DynDatabasePool,
}

impl SqlxPhotoRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PhotoRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PhotoRepository for SqlxPhotoRepository {
    async fn create(&self, photo: &CompanyPhoto) -> Result<CompanyPhoto> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_photo_sqlite(pool, photo).await,
            Backend::Mysql(pool) => create_photo_mysql(pool, photo).await,
        }
    }

    async fn list_by_company(&self, company_id: i64) -> Result<Vec<CompanyPhoto>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_photos_sqlite(pool, company_id).await,
            Backend::Mysql(pool) => list_photos_mysql(pool, company_id).await,
        }
    }

    async fn find_by_public_paths(
        &self,
        company_id: i64,
        public_paths: &[String],
    ) -> Result<Vec<CompanyPhoto>> {
        let mut found = Vec::new();
        for path in public_paths {
            let photo = match self.pool.backend() {
                Backend::Sqlite(pool) => find_photo_sqlite(pool, company_id, path).await?,
                Backend::Mysql(pool) => find_photo_mysql(pool, company_id, path).await?,
            };
            found.extend(photo);
        }
        Ok(found)
    }

    async fn delete(&self, company_id: i64, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(DELETE_PHOTO_SQL)
                .bind(id)
                .bind(company_id)
                .execute(pool)
                .await
                .context("Failed to delete photo")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(DELETE_PHOTO_SQL)
                .bind(id)
                .bind(company_id)
                .execute(pool)
                .await
                .context("Failed to delete photo")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

const INSERT_PHOTO_SQL: &str = r#"
    INSERT INTO company_photos (company_id, private_path, public_path, created_at)
    VALUES (?, ?, ?, ?)
"#;

const DELETE_PHOTO_SQL: &str = "DELETE FROM company_photos WHERE id = ? AND company_id = ?";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_photo_sqlite(pool: &SqlitePool, photo: &CompanyPhoto) -> Result<CompanyPhoto> {
    let result = sqlx::query(INSERT_PHOTO_SQL)
        .bind(photo.company_id)
        .bind(&photo.private_path)
        .bind(&photo.public_path)
        .bind(photo.created_at)
        .execute(pool)
        .await
        .context("Failed to create photo")?;

    let mut created = photo.clone();
    created.id = result.last_insert_rowid();
    Ok(created)
}

async fn list_photos_sqlite(pool: &SqlitePool, company_id: i64) -> Result<Vec<CompanyPhoto>> {
    let rows = sqlx::query(
        r#"
        SELECT id, company_id, private_path, public_path, created_at
        FROM company_photos
        WHERE company_id = ?
        ORDER BY id
        "#,
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
    .context("Failed to list photos")?;

    rows.iter().map(row_to_photo_sqlite).collect()
}

async fn find_photo_sqlite(
    pool: &SqlitePool,
    company_id: i64,
    public_path: &str,
) -> Result<Option<CompanyPhoto>> {
    let row = sqlx::query(
        r#"
        SELECT id, company_id, private_path, public_path, created_at
        FROM company_photos
        WHERE company_id = ? AND public_path = ?
        "#,
    )
    .bind(company_id)
    .bind(public_path)
    .fetch_optional(pool)
    .await
    .context("Failed to find photo")?;

    row.as_ref().map(row_to_photo_sqlite).transpose()
}

fn row_to_photo_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CompanyPhoto> {
    Ok(CompanyPhoto {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        private_path: row.try_get("private_path")?,
        public_path: row.try_get("public_path")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_photo_mysql(pool: &MySqlPool, photo: &CompanyPhoto) -> Result<CompanyPhoto> {
    let result = sqlx::query(INSERT_PHOTO_SQL)
        .bind(photo.company_id)
        .bind(&photo.private_path)
        .bind(&photo.public_path)
        .bind(photo.created_at)
        .execute(pool)
        .await
        .context("Failed to create photo")?;

    let mut created = photo.clone();
    created.id = result.last_insert_id() as i64;
    Ok(created)
}

async fn list_photos_mysql(pool: &MySqlPool, company_id: i64) -> Result<Vec<CompanyPhoto>> {
    let rows = sqlx::query(
        r#"
        SELECT id, company_id, private_path, public_path, created_at
        FROM company_photos
        WHERE company_id = ?
        ORDER BY id
        "#,
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
    .context("Failed to list photos")?;

    rows.iter().map(row_to_photo_mysql).collect()
}

async fn find_photo_mysql(
    pool: &MySqlPool,
    company_id: i64,
    public_path: &str,
) -> Result<Option<CompanyPhoto>> {
    let row = sqlx::query(
        r#"
        SELECT id, company_id, private_path, public_path, created_at
        FROM company_photos
        WHERE company_id = ? AND public_path = ?
        "#,
    )
    .bind(company_id)
    .bind(public_path)
    .fetch_optional(pool)
    .await
    .context("Failed to find photo")?;

    row.as_ref().map(row_to_photo_mysql).transpose()
}

fn row_to_photo_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CompanyPhoto> {
    Ok(CompanyPhoto {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        private_path: row.try_get("private_path")?,
        public_path: row.try_get("public_path")?,
        created_at: row.try_get("created_at")?,
    })
}

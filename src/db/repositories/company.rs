//! Company repository
//!
//! Database operations for companies, their profiles and the geo index.
//!
//! This module provides:
//! - `CompanyRepository` trait defining the interface for company data access
//! - `SqlxCompanyRepository` implementing the trait for SQLite and MySQL
//!
//! On SQLite every company with a profile has one degenerate box (a point)
//! in the `company_locations` R*Tree; `save_profile` keeps both tables in
//! step inside one transaction. On MySQL the coordinates columns are indexed
//! directly.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{BusinessHours, Company, CompanyData, Coordinates};
use crate::services::geo_query::{BoundingBox, GeoCandidate, GeoFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;

/// Returned by [`CompanyRepository::create`] when the login email is
/// already taken.
#[derive(Debug, thiserror::Error)]
#[error("Email '{0}' is already registered")]
pub struct DuplicateEmail(pub String);

/// Company repository trait
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Create a new company (credentials only).
    ///
    /// Fails with [`DuplicateEmail`] when the unique email index rejects
    /// the row.
    async fn create(&self, company: &Company) -> Result<Company>;

    /// Get company by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Company>>;

    /// Get company by (normalized) login email
    async fn get_by_email(&self, email: &str) -> Result<Option<Company>>;

    /// Attach or replace the profile and its geo index entry.
    ///
    /// Returns `false` if no company has this ID.
    async fn save_profile(&self, id: i64, data: &CompanyData) -> Result<bool>;

    /// Companies inside the filter circle, each with its distance in meters.
    ///
    /// Order is unspecified.
    async fn find_near(&self, filter: &GeoFilter) -> Result<Vec<GeoCandidate>>;
}

/// SQLx-based company repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCompanyRepository {
    pool: DynDatabasePool,
}

impl SqlxCompanyRepository {
    /// Create a new SQLx company repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CompanyRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CompanyRepository for SqlxCompanyRepository {
    async fn create(&self, company: &Company) -> Result<Company> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_company_sqlite(pool, company).await,
            Backend::Mysql(pool) => create_company_mysql(pool, company).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Company>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_company_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_company_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Company>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_company_by_email_sqlite(pool, email).await,
            Backend::Mysql(pool) => get_company_by_email_mysql(pool, email).await,
        }
    }

    async fn save_profile(&self, id: i64, data: &CompanyData) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => save_profile_sqlite(pool, id, data).await,
            Backend::Mysql(pool) => save_profile_mysql(pool, id, data).await,
        }
    }

    async fn find_near(&self, filter: &GeoFilter) -> Result<Vec<GeoCandidate>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_near_sqlite(pool, filter).await,
            Backend::Mysql(pool) => find_near_mysql(pool, filter).await,
        }
    }
}

const COMPANY_COLUMNS: &str = "c.id, c.email, c.password_hash, c.has_profile, c.name, \
    c.description, c.phone_number, c.contact_email, c.address_line1, c.address_line2, \
    c.city, c.state, c.country, c.longitude, c.latitude, c.business_hours, \
    c.created_at, c.updated_at";

const UPDATE_PROFILE_SQL: &str = r#"
    UPDATE companies SET
        has_profile = ?, name = ?, description = ?, phone_number = ?, contact_email = ?,
        address_line1 = ?, address_line2 = ?, city = ?, state = ?, country = ?,
        longitude = ?, latitude = ?, business_hours = ?, updated_at = ?
    WHERE id = ?
"#;

/// Nullable profile columns as read from a row
struct ProfileColumns {
    has_profile: bool,
    name: Option<String>,
    description: Option<String>,
    phone_number: Option<String>,
    contact_email: Option<String>,
    address_line1: Option<String>,
    address_line2: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    business_hours: Option<String>,
}

impl ProfileColumns {
    fn into_company_data(self) -> Result<Option<CompanyData>> {
        if !self.has_profile {
            return Ok(None);
        }
        let business_hours: Vec<BusinessHours> = match self.business_hours {
            Some(json) => {
                serde_json::from_str(&json).context("Corrupt business_hours column")?
            }
            None => Vec::new(),
        };
        Ok(Some(CompanyData {
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            phone_number: self.phone_number.unwrap_or_default(),
            email: self.contact_email.unwrap_or_default(),
            address_line1: self.address_line1.unwrap_or_default(),
            address_line2: self.address_line2,
            city: self.city.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
            address_coords: Coordinates::new(
                self.longitude.unwrap_or_default(),
                self.latitude.unwrap_or_default(),
            ),
            business_hours,
        }))
    }
}

fn business_hours_json(data: &CompanyData) -> Result<String> {
    serde_json::to_string(&data.business_hours).context("Failed to encode business hours")
}

fn create_error(err: sqlx::Error, email: &str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DuplicateEmail(email.to_string()).into()
        }
        _ => anyhow::Error::new(err).context("Failed to create company"),
    }
}

/// Keep geo-index hits inside the circle, attaching their distance.
fn refine(filter: &GeoFilter, seen: &mut HashSet<i64>, company: Company) -> Option<GeoCandidate> {
    if !seen.insert(company.id) {
        return None;
    }
    let data = company.company_data?;
    let distance = filter.distance_within(&data.address_coords)?;
    Some(GeoCandidate {
        id: company.id,
        data,
        distance,
    })
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_company_sqlite(pool: &SqlitePool, company: &Company) -> Result<Company> {
    let result = sqlx::query(
        r#"
        INSERT INTO companies (email, password_hash, has_profile, created_at, updated_at)
        VALUES (?, ?, 0, ?, ?)
        "#,
    )
    .bind(&company.email)
    .bind(&company.password_hash)
    .bind(company.created_at)
    .bind(company.updated_at)
    .execute(pool)
    .await
    .map_err(|e| create_error(e, &company.email))?;

    let mut created = company.clone();
    created.id = result.last_insert_rowid();
    created.company_data = None;
    Ok(created)
}

async fn get_company_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Company>> {
    let sql = format!("SELECT {} FROM companies c WHERE c.id = ?", COMPANY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get company by ID")?;

    row.as_ref().map(row_to_company_sqlite).transpose()
}

async fn get_company_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<Company>> {
    let sql = format!("SELECT {} FROM companies c WHERE c.email = ?", COMPANY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get company by email")?;

    row.as_ref().map(row_to_company_sqlite).transpose()
}

async fn save_profile_sqlite(pool: &SqlitePool, id: i64, data: &CompanyData) -> Result<bool> {
    let hours = business_hours_json(data)?;
    let coords = data.address_coords;
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(UPDATE_PROFILE_SQL)
        .bind(true)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.phone_number)
        .bind(&data.email)
        .bind(&data.address_line1)
        .bind(&data.address_line2)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.country)
        .bind(coords.longitude)
        .bind(coords.latitude)
        .bind(&hours)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to save company profile")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM company_locations WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear company location")?;

    sqlx::query(
        "INSERT INTO company_locations (id, min_lon, max_lon, min_lat, max_lat) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(coords.longitude)
    .bind(coords.longitude)
    .bind(coords.latitude)
    .bind(coords.latitude)
    .execute(&mut *tx)
    .await
    .context("Failed to index company location")?;

    tx.commit().await.context("Failed to commit profile")?;
    Ok(true)
}

async fn find_near_sqlite(pool: &SqlitePool, filter: &GeoFilter) -> Result<Vec<GeoCandidate>> {
    let profile_clause = if filter.profile_required {
        " AND c.has_profile = 1"
    } else {
        ""
    };
    let sql = format!(
        "SELECT {} FROM company_locations l JOIN companies c ON c.id = l.id \
         WHERE l.min_lon <= ? AND l.max_lon >= ? AND l.min_lat <= ? AND l.max_lat >= ?{}",
        COMPANY_COLUMNS, profile_clause
    );

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for BoundingBox {
        min_lon,
        max_lon,
        min_lat,
        max_lat,
    } in filter.bounding_boxes()
    {
        let rows = sqlx::query(&sql)
            .bind(max_lon)
            .bind(min_lon)
            .bind(max_lat)
            .bind(min_lat)
            .fetch_all(pool)
            .await
            .context("Failed to query company locations")?;

        for row in &rows {
            let company = row_to_company_sqlite(row)?;
            candidates.extend(refine(filter, &mut seen, company));
        }
    }

    Ok(candidates)
}

fn row_to_company_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Company> {
    let profile = ProfileColumns {
        has_profile: row.try_get("has_profile")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        phone_number: row.try_get("phone_number")?,
        contact_email: row.try_get("contact_email")?,
        address_line1: row.try_get("address_line1")?,
        address_line2: row.try_get("address_line2")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        country: row.try_get("country")?,
        longitude: row.try_get("longitude")?,
        latitude: row.try_get("latitude")?,
        business_hours: row.try_get("business_hours")?,
    };

    Ok(Company {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        company_data: profile.into_company_data()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_company_mysql(pool: &MySqlPool, company: &Company) -> Result<Company> {
    let result = sqlx::query(
        r#"
        INSERT INTO companies (email, password_hash, has_profile, created_at, updated_at)
        VALUES (?, ?, FALSE, ?, ?)
        "#,
    )
    .bind(&company.email)
    .bind(&company.password_hash)
    .bind(company.created_at)
    .bind(company.updated_at)
    .execute(pool)
    .await
    .map_err(|e| create_error(e, &company.email))?;

    let mut created = company.clone();
    created.id = result.last_insert_id() as i64;
    created.company_data = None;
    Ok(created)
}

async fn get_company_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Company>> {
    let sql = format!("SELECT {} FROM companies c WHERE c.id = ?", COMPANY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get company by ID")?;

    row.as_ref().map(row_to_company_mysql).transpose()
}

async fn get_company_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<Company>> {
    let sql = format!("SELECT {} FROM companies c WHERE c.email = ?", COMPANY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get company by email")?;

    row.as_ref().map(row_to_company_mysql).transpose()
}

async fn save_profile_mysql(pool: &MySqlPool, id: i64, data: &CompanyData) -> Result<bool> {
    let hours = business_hours_json(data)?;
    let coords = data.address_coords;

    let result = sqlx::query(UPDATE_PROFILE_SQL)
        .bind(true)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.phone_number)
        .bind(&data.email)
        .bind(&data.address_line1)
        .bind(&data.address_line2)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.country)
        .bind(coords.longitude)
        .bind(coords.latitude)
        .bind(&hours)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to save company profile")?;

    // MySQL reports zero affected rows when nothing changed, so check existence
    if result.rows_affected() == 0 {
        return Ok(get_company_by_id_mysql(pool, id).await?.is_some());
    }
    Ok(true)
}

async fn find_near_mysql(pool: &MySqlPool, filter: &GeoFilter) -> Result<Vec<GeoCandidate>> {
    let profile_clause = if filter.profile_required {
        "c.has_profile = TRUE AND "
    } else {
        ""
    };
    let sql = format!(
        "SELECT {} FROM companies c \
         WHERE {}c.latitude BETWEEN ? AND ? AND c.longitude BETWEEN ? AND ?",
        COMPANY_COLUMNS, profile_clause
    );

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for bbox in filter.bounding_boxes() {
        let rows = sqlx::query(&sql)
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(bbox.min_lon)
            .bind(bbox.max_lon)
            .fetch_all(pool)
            .await
            .context("Failed to query company locations")?;

        for row in &rows {
            let company = row_to_company_mysql(row)?;
            candidates.extend(refine(filter, &mut seen, company));
        }
    }

    Ok(candidates)
}

fn row_to_company_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Company> {
    let profile = ProfileColumns {
        has_profile: row.try_get("has_profile")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        phone_number: row.try_get("phone_number")?,
        contact_email: row.try_get("contact_email")?,
        address_line1: row.try_get("address_line1")?,
        address_line2: row.try_get("address_line2")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        country: row.try_get("country")?,
        longitude: row.try_get("longitude")?,
        latitude: row.try_get("latitude")?,
        business_hours: row.try_get("business_hours")?,
    };

    Ok(Company {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        company_data: profile.into_company_data()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

//! Database layer
//!
//! Database abstraction for the bizmap service. It supports:
//! - SQLite (default, single-file deployment, R*Tree geo index)
//! - MySQL (composite latitude/longitude index)
//!
//! The database driver is selected based on configuration.
//!
//! # Usage
//!
//! ```ignore
//! use bizmap::config::DatabaseConfig;
//! use bizmap::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};

//! Relational storage for the Instagram publishing backend
//!
//! This crate owns the `SQLite` schema and the repository that records every
//! image published to an Instagram Business Account.

pub mod pagination;
pub mod publishing_metadata;

use sqlx::{migrate::MigrateError, SqlitePool};

/// Applies the embedded schema migrations to the given pool
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails to apply
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

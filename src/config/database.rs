//! Preference database connection.
//!
//! The local `SQLite` file only holds client preferences. Tables are created
//! from the entity definitions with `Schema::create_table_from_entity`, and
//! creation is skipped for tables that already exist so the same call works
//! on first run and every run after it.

use crate::entities::Preference;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;
use tracing::debug;

/// Opens `database_url`, creating the parent directory of a file-backed
/// `SQLite` database if needed, and creates missing tables.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(dir) = sqlite_parent_dir(database_url) {
        std::fs::create_dir_all(dir)?;
    }

    let db = Database::connect(database_url).await?;
    create_tables(&db).await?;
    debug!("Preference database ready");
    Ok(db)
}

/// Creates every table that does not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut preference_table = schema.create_table_from_entity(Preference);
    preference_table.if_not_exists();
    db.execute(builder.build(&preference_table)).await?;

    Ok(())
}

/// Directory holding the database file, `None` for in-memory or non-`SQLite` URLs.
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

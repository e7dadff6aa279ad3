//! Local preference storage.
//!
//! Client settings are kept as string literals under named keys. The
//! [`PreferenceStore`] trait lets the UI mode context persist through `SQLite`
//! on a desktop install or through a plain map when embedded or under test.

use crate::{
    entities::{Preference, preference},
    errors::Result,
};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, Set, prelude::*};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Persistent string storage keyed by preference name.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Reads the stored literal for `key`, `None` if nothing was ever written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// Preference store backed by the `preferences` table.
#[derive(Debug, Clone)]
pub struct SqlitePreferenceStore {
    db: DatabaseConnection,
}

impl SqlitePreferenceStore {
    /// Wraps an open connection whose tables have been created.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = Preference::find()
            .filter(preference::Column::Key.eq(key))
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.value))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().naive_utc();

        let existing = Preference::find()
            .filter(preference::Column::Key.eq(key))
            .one(&self.db)
            .await?;

        if let Some(row) = existing {
            let mut active: preference::ActiveModel = row.into();
            active.value = Set(value.to_string());
            active.updated_at = Set(now);
            active.update(&self.db).await?;
        } else {
            let row = preference::ActiveModel {
                key: Set(key.to_string()),
                value: Set(value.to_string()),
                updated_at: Set(now),
                ..Default::default()
            };
            row.insert(&self.db).await?;
        }

        debug!(key, value, "Preference persisted");
        Ok(())
    }
}

/// In-process preference store.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_string(), value.to_string());
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_sqlite_store_round_trip() -> Result<()> {
        let store = SqlitePreferenceStore::new(setup_test_db().await?);

        assert_eq!(store.get("ui_mode").await?, None);

        store.put("ui_mode", "advanced").await?;
        assert_eq!(store.get("ui_mode").await?.as_deref(), Some("advanced"));

        // Second write updates the existing row instead of inserting a duplicate
        store.put("ui_mode", "simple").await?;
        assert_eq!(store.get("ui_mode").await?.as_deref(), Some("simple"));

        let rows = Preference::find().all(&store.db).await?;
        assert_eq!(rows.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store() -> Result<()> {
        let store = MemoryPreferenceStore::with_entry("ui_mode", "advanced");
        assert_eq!(store.get("ui_mode").await?.as_deref(), Some("advanced"));
        assert_eq!(store.get("missing").await?, None);
        store.put("missing", "x").await?;
        assert_eq!(store.get("missing").await?.as_deref(), Some("x"));
        Ok(())
    }
}

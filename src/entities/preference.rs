//! Preference entity - Key-value pairs persisted on the local machine.
//! Holds client-side settings that must survive a restart, such as the
//! selected UI mode.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Preference database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "preferences")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Preference key (e.g., `"ui_mode"`)
    #[sea_orm(unique)]
    pub key: String,
    /// Stored literal
    pub value: String,
    /// When the value was last written
    pub updated_at: DateTime,
}

/// Preferences stand alone
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Preference database connection and schema
pub mod database;

/// Settings file and environment overrides
pub mod settings;

pub use settings::{AppConfig, DEFAULT_CONFIG_PATH, load_app_configuration};

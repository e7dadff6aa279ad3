//! Core client logic - framework-agnostic state and formatting that every
//! screen builds on.

/// Reporting window selection and validation
pub mod date_range;
/// Currency, number and date formatting
pub mod format;
/// Local key-value preference storage
pub mod preferences;
/// Query-string construction
pub mod query;
/// Simple / advanced UI mode context
pub mod ui_mode;

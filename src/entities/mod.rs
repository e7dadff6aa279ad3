//! Entity module - `SeaORM` entity definitions for the local database.
//! The backend owns all billing records; locally only client preferences
//! are stored.

pub mod preference;

pub use preference::{Column as PreferenceColumn, Entity as Preference, Model as PreferenceModel};

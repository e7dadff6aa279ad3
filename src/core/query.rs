//! Query-string construction for list and report requests.
//!
//! Filters reach the backend as `application/x-www-form-urlencoded` pairs.
//! Fields without a value are left out entirely: several filters default to
//! "no filter" and must not show up as empty parameters.

use std::fmt;
use url::form_urlencoded;

/// A single filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Text value; the empty string counts as absent
    Str(String),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value, serialized as `true` / `false`
    Bool(bool),
    /// Explicit null; never serialized
    Null,
}

impl QueryValue {
    /// Canonical text form, or `None` when the value must be dropped.
    #[must_use]
    pub fn to_query_text(&self) -> Option<String> {
        match self {
            Self::Str(s) if s.is_empty() => None,
            Self::Str(s) => Some(s.clone()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null => None,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_query_text().as_deref().unwrap_or(""))
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered mapping of filter field to value.
///
/// Iteration order is insertion order. Setting a field that already exists
/// replaces its value without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    fields: Vec<(String, Option<QueryValue>)>,
}

impl QueryParams {
    /// Creates an empty mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Sets `field` to `value`, keeping the field's original position.
    pub fn set(&mut self, field: impl Into<String>, value: Option<QueryValue>) -> &mut Self {
        let field = field.into();
        if let Some(slot) = self.fields.iter_mut().find(|(name, _)| *name == field) {
            slot.1 = value;
        } else {
            self.fields.push((field, value));
        }
        self
    }

    /// Builder form of [`QueryParams::set`] for a present value.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    /// Builder form of [`QueryParams::set`] for an optional value.
    #[must_use]
    pub fn with_opt<V: Into<QueryValue>>(mut self, field: impl Into<String>, value: Option<V>) -> Self {
        self.set(field, value.map(Into::into));
        self
    }

    /// Fields that survive serialization, with their canonical text.
    pub fn present(&self) -> impl Iterator<Item = (&str, String)> {
        self.fields.iter().filter_map(|(name, value)| {
            value
                .as_ref()
                .and_then(QueryValue::to_query_text)
                .map(|text| (name.as_str(), text))
        })
    }
}

/// Serializes `params` into a query string without the leading `?`.
///
/// Returns the empty string when every field is dropped.
#[must_use]
pub fn build_query_string(params: &QueryParams) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, text) in params.present() {
        serializer.append_pair(name, &text);
    }
    serializer.finish()
}

/// Appends the serialized `params` to `path`, omitting `?` when there is nothing to add.
#[must_use]
pub fn with_query(path: &str, params: &QueryParams) -> String {
    let query = build_query_string(params);
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

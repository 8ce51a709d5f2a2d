//! Fixture sets: named collections of rows used to seed a data source
//!
//! JSON fixtures are an object of arrays:
//!
//! ```json
//! { "articles": [ { "id": 1000, "title": "Article #1", "author_id": 2000 } ] }
//! ```
//!
//! TOML fixtures use arrays of tables:
//!
//! ```toml
//! [[articles]]
//! id = 1000
//! title = "Article #1"
//! ```

use crate::StoreError;
use indexmap::IndexMap;
use quarry_domain::Row;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Rows grouped by collection name, in file order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureSet(IndexMap<String, Vec<Row>>);

impl FixtureSet {
    /// Create an empty fixture set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows to a collection, builder style
    pub fn with_rows(mut self, collection: impl Into<String>, rows: Vec<Row>) -> Self {
        self.0.entry(collection.into()).or_default().extend(rows);
        self
    }

    /// Parse a JSON fixture document
    pub fn from_json_str(s: &str) -> Result<Self, StoreError> {
        serde_json::from_str(s).map_err(|e| StoreError::Fixture(e.to_string()))
    }

    /// Parse a TOML fixture document
    pub fn from_toml_str(s: &str) -> Result<Self, StoreError> {
        toml::from_str(s).map_err(|e| StoreError::Fixture(e.to_string()))
    }

    /// Load a fixture file; the format follows the extension (`.json` or `.toml`)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&contents),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_str(&contents),
            _ => Err(StoreError::Fixture(format!(
                "Unsupported fixture format: {}",
                path.display()
            ))),
        }
    }

    /// Append every collection of `other` to this set
    pub fn merge(&mut self, other: FixtureSet) {
        for (collection, rows) in other.0 {
            self.0.entry(collection).or_default().extend(rows);
        }
    }

    /// Iterate over collections and their rows
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Row>)> {
        self.0.iter()
    }

    /// Total number of rows across all collections
    pub fn row_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// True when no rows are present
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

impl IntoIterator for FixtureSet {
    type Item = (String, Vec<Row>);
    type IntoIter = indexmap::map::IntoIter<String, Vec<Row>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

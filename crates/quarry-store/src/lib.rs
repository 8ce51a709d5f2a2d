//! Quarry Storage Layer
//!
//! Implements the `DataSource` trait with an in-memory reference backend.
//!
//! # Architecture
//!
//! - Collections of rows kept in insertion order
//! - Criteria evaluated per row, after sorting, then paginated
//! - Per-collection auto-increment identifiers
//! - Optional seeding from JSON or TOML fixture files
//!
//! # Examples
//!
//! ```
//! use quarry_domain::{Criteria, DataSource, QueryObject, Row, Value};
//! use quarry_store::MemoryDataSource;
//!
//! let mut store = MemoryDataSource::new();
//! let mut row = Row::new();
//! row.insert("title".to_string(), Value::from("Article #1"));
//! store.create("articles", row).unwrap();
//!
//! assert_eq!(store.generated_id(), Some(Value::Int(1)));
//! let rows = store.read("articles", &QueryObject::with_criteria(Criteria::new().and("id", 1))).unwrap();
//! assert_eq!(rows.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod fixture;
pub mod memory;

pub use config::StoreConfig;
pub use fixture::FixtureSet;
pub use memory::MemoryDataSource;

use quarry_domain::{ConditionError, DataSourceError, Value};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// A criteria key could not be parsed
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(#[from] ConditionError),

    /// A sort field is missing from at least one row
    #[error("The key `{0}` does not exist in one or more rows of the data")]
    UnknownSortField(String),

    /// A row was created with an identifier that is already taken
    #[error("Duplicate key {id} in `{collection}`")]
    DuplicateKey {
        /// Collection written to
        collection: String,
        /// Identifier already present
        id: Value,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fixture file could not be parsed
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for DataSourceError {
    fn from(error: StoreError) -> Self {
        DataSourceError::new(error)
    }
}

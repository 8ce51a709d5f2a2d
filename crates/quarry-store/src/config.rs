//! Configuration for the in-memory data source
//!
//! Loaded from TOML, for example:
//!
//! ```toml
//! id_field = "id"
//! auto_increment = 1000
//! fixtures = ["fixtures/articles.json", "fixtures/tags.toml"]
//! ```

use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for [`MemoryDataSource`](crate::MemoryDataSource)
///
/// # Examples
///
/// ```
/// use quarry_store::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.id_field, "id");
/// assert_eq!(config.auto_increment, 0);
///
/// let config = StoreConfig::from_toml_str("auto_increment = 1000").unwrap();
/// assert_eq!(config.auto_increment, 1000);
/// assert_eq!(config.id_field, "id");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Field that receives generated identifiers
    /// Default: "id"
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Starting point of every collection's identifier counter;
    /// the first generated identifier is one above it
    /// Default: 0
    #[serde(default)]
    pub auto_increment: i64,

    /// Fixture files loaded at construction, JSON or TOML by extension
    /// Relative paths resolve against the config file's directory when
    /// loaded through [`StoreConfig::load`]
    #[serde(default)]
    pub fixtures: Vec<PathBuf>,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
            auto_increment: 0,
            fixtures: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self, StoreError> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;

        if let Some(dir) = path.parent() {
            for fixture in &mut config.fixtures {
                if fixture.is_relative() {
                    *fixture = dir.join(&*fixture);
                }
            }
        }

        Ok(config)
    }

    /// Check the configuration for obviously invalid values
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.id_field.trim().is_empty() {
            return Err(StoreError::Config("id_field cannot be empty".to_string()));
        }
        if self.auto_increment < 0 {
            return Err(StoreError::Config(format!(
                "auto_increment must not be negative, got {}",
                self.auto_increment
            )));
        }
        Ok(())
    }
}

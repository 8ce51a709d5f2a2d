//! Table, primary key and field whitelist of a mapper

use crate::MapperError;

/// Storage layout a mapper maps its entity onto
///
/// # Examples
///
/// ```
/// use quarry_orm::MapperSchema;
///
/// let schema = MapperSchema::new("articles").with_fields(["id", "title", "author_id"]);
/// assert_eq!(schema.table(), "articles");
/// assert_eq!(schema.primary_key(), ["id"]);
/// assert!(schema.has_field("title"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperSchema {
    table: String,
    primary_key: Vec<String>,
    fields: Vec<String>,
}

impl MapperSchema {
    /// Create a schema for a table; the primary key defaults to `id`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: vec!["id".to_string()],
            fields: Vec::new(),
        }
    }

    /// Set the primary key fields
    pub fn with_primary_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the field whitelist
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Collection name in the data source
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary key fields
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// The primary key when it is a single field
    pub fn single_primary_key(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [key] => Some(key),
            _ => None,
        }
    }

    /// Check that rows of this table can be addressed one at a time
    ///
    /// An empty primary key would turn every single-entity update or delete
    /// into a statement over the whole table.
    pub fn validate(&self) -> Result<(), MapperError> {
        if self.primary_key.is_empty() {
            return Err(MapperError::Configuration(format!(
                "`{}` has no primary key",
                self.table
            )));
        }
        Ok(())
    }

    /// First primary key field, used to relate rows
    pub(crate) fn binding_key(&self) -> Result<&str, MapperError> {
        self.primary_key
            .first()
            .map(String::as_str)
            .ok_or_else(|| MapperError::Configuration(format!("`{}` has no primary key", self.table)))
    }

    /// Whitelisted fields
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// True when the field is whitelisted
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }
}

//! Mapper error types

use quarry_domain::{DataSourceError, EntityError};
use thiserror::Error;

/// Errors that can occur during mapper operations
///
/// A hook veto is not an error: vetoed operations return `Ok(false)`.
#[derive(Error, Debug)]
pub enum MapperError {
    /// `get` found no matching entity
    #[error("Entity not found")]
    EntityNotFound,

    /// An argument cannot be used for the requested operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An update or delete could not derive a value for a primary-key field
    #[error("Primary key `{0}` has no value")]
    MissingPrimaryKey(String),

    /// Invalid association definition or mapper registration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Entity field access failed
    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    /// Storage error, carried unchanged
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}

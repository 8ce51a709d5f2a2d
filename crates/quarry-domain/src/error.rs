//! Error types shared across the mapping layers

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error produced by a storage backend
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Conversion failure between a [`Value`](crate::Value) and a field type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The value was of a different kind than the field requires
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind the field requires
        expected: &'static str,
        /// Kind that was supplied
        found: &'static str,
    },
}

/// Errors raised by an entity's structured field access
#[derive(Error, Debug)]
pub enum EntityError {
    /// The entity has no field with this name
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The entity has no association property with this name
    #[error("Unknown association property: {0}")]
    UnknownProperty(String),

    /// A value could not be converted into the field's type
    #[error("Invalid value for `{field}`: {source}")]
    InvalidValue {
        /// Field being assigned
        field: String,
        /// Underlying conversion failure
        #[source]
        source: ValueError,
    },

    /// Related entities were of an unexpected type
    #[error("Related entity for `{0}` has an unexpected type")]
    RelatedType(String),
}

impl EntityError {
    /// Attach the field name to a conversion failure
    pub fn invalid_value(field: &str, source: ValueError) -> Self {
        EntityError::InvalidValue {
            field: field.to_string(),
            source,
        }
    }
}

/// Error surfaced by a [`DataSource`](crate::traits::DataSource)
///
/// The mapping layers never translate backend failures; they carry the
/// backend's own error through this wrapper so callers can downcast it.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct DataSourceError(#[from] BoxError);

impl DataSourceError {
    /// Wrap a backend error
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    /// Borrow the backend error as a concrete type
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Consume the wrapper, returning the backend error
    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

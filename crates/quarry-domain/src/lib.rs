//! Quarry Domain Layer
//!
//! This crate contains the vocabulary shared by every Quarry layer: values and
//! rows, query objects, the entity contract and the data source boundary.
//!
//! ## Key Concepts
//!
//! - **Value / Row**: dynamic values and the field-to-value maps storage speaks
//! - **QueryObject**: criteria plus options describing a lookup
//! - **Condition**: a criteria key parsed into field, operator and literal
//! - **Entity**: a plain record with structured field access and a stable handle
//! - **DataSource**: the narrow storage contract mappers delegate to
//!
//! ## Architecture
//!
//! - No storage or mapping logic lives here
//! - Infrastructure implementations live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod condition;
pub mod entity;
pub mod error;
pub mod query;
pub mod traits;
pub mod value;

// Re-exports for convenience
pub use condition::{Condition, ConditionError, ConditionSet, Operator};
pub use entity::{Entity, EntityHandle, Related, WeakEntityHandle};
pub use error::{BoxError, DataSourceError, EntityError, ValueError};
pub use query::{Criteria, Direction, OptionName, Order, QueryObject, QueryOption, QueryOptions};
pub use traits::{shared, DataSource, SharedDataSource};
pub use value::{FromValue, Row, Value};

//! Quarry Object Mapping Layer
//!
//! Maps entities to and from data source rows.
//!
//! # Architecture
//!
//! - [`DataMapper`]: schema, hooks and persisted tracking for one entity type
//! - [`Mapper`]: finder and persistence surface, built on `read` and `delete`
//! - [`ObjectRelationalMapper`]: associations, join-free eager loading and
//!   cascading deletes
//! - [`MapperManager`]: lazily builds and caches one mapper per entity type
//! - [`Repository`]: application-facing wrapper over a mapper
//!
//! Everything here is single-threaded: mappers share their data source through
//! `Rc<RefCell<_>>` and borrow it for one storage call at a time, so hooks and
//! related mappers may use it freely.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod association;
pub mod error;
pub mod hooks;
pub mod list;
pub mod manager;
pub mod mapper;
pub mod relational;
pub mod repository;
pub mod schema;

pub use association::{Association, AssociationKind, Cardinality, RelatedMapper};
pub use error::MapperError;
pub use hooks::Hooks;
pub use list::{FieldList, ListFields};
pub use manager::MapperManager;
pub use mapper::{DataMapper, EntityOptions, Mapper};
pub use relational::{Mapped, ObjectRelationalMapper};
pub use repository::Repository;
pub use schema::MapperSchema;

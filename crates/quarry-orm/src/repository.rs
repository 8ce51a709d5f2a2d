//! Repository: an application-facing layer over a mapper
//!
//! A repository exposes the same finder and persistence surface as the mapper
//! it wraps and is where application-specific queries belong. Wrap it in a
//! domain type, or add methods through an extension trait.

use crate::mapper::{DataMapper, Mapper};
use crate::MapperError;
use quarry_domain::QueryObject;
use std::rc::Rc;

/// Delegating wrapper around a shared mapper
pub struct Repository<M: Mapper> {
    mapper: Rc<M>,
}

impl<M: Mapper> Repository<M> {
    /// Wrap a mapper, usually one handed out by the
    /// [`MapperManager`](crate::MapperManager)
    pub fn new(mapper: Rc<M>) -> Self {
        Self { mapper }
    }

    /// The wrapped mapper
    pub fn mapper(&self) -> &M {
        &self.mapper
    }
}

impl<M: Mapper> Clone for Repository<M> {
    fn clone(&self) -> Self {
        Self {
            mapper: Rc::clone(&self.mapper),
        }
    }
}

impl<M: Mapper> Mapper for Repository<M> {
    type Entity = M::Entity;

    fn data_mapper(&self) -> &DataMapper<M::Entity> {
        self.mapper.data_mapper()
    }

    fn read(&self, query: QueryObject) -> Result<Vec<M::Entity>, MapperError> {
        self.mapper.read(query)
    }

    fn delete(&self, entity: &M::Entity) -> Result<bool, MapperError> {
        self.mapper.delete(entity)
    }
}

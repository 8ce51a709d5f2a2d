//! Mapper registry
//!
//! Hands out one mapper per entity type, building it on first use. Mappers
//! keep a weak reference back to the registry and look up related mappers
//! through it, so two mappers that reference each other never own each other.

use crate::association::RelatedMapper;
use crate::relational::{Mapped, ObjectRelationalMapper};
use crate::MapperError;
use quarry_domain::{Entity, SharedDataSource};
use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

type Factory =
    Rc<dyn Fn(SharedDataSource, &MapperManager) -> Result<Rc<dyn RelatedMapper>, MapperError>>;

/// Lazy registry of object-relational mappers
///
/// # Examples
///
/// ```ignore
/// let manager = MapperManager::new(shared(MemoryDataSource::new()));
/// let articles = manager.get::<Article>()?;
/// assert!(Rc::ptr_eq(&articles, &manager.get::<Article>()?));
/// ```
pub struct MapperManager {
    data_source: SharedDataSource,
    mappers: RefCell<HashMap<TypeId, Rc<dyn RelatedMapper>>>,
    factories: RefCell<HashMap<TypeId, Factory>>,
    this: Weak<MapperManager>,
}

impl MapperManager {
    /// Create a registry whose mappers all use `data_source`
    pub fn new(data_source: SharedDataSource) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            data_source,
            mappers: RefCell::new(HashMap::new()),
            factories: RefCell::new(HashMap::new()),
            this: Weak::clone(this),
        })
    }

    /// The data source handed to mappers built by this registry
    pub fn data_source(&self) -> SharedDataSource {
        SharedDataSource::clone(&self.data_source)
    }

    /// Register how the mapper for `E` is built, without building it
    pub fn configure<E, F>(&self, factory: F) -> &Self
    where
        E: Entity,
        F: Fn(SharedDataSource, &MapperManager) -> Result<ObjectRelationalMapper<E>, MapperError>
            + 'static,
    {
        let factory: Factory = Rc::new(move |data_source: SharedDataSource, manager: &MapperManager| {
            let mapper: Rc<dyn RelatedMapper> = Rc::new(factory(data_source, manager)?);
            Ok(mapper)
        });
        self.factories.borrow_mut().insert(TypeId::of::<E>(), factory);
        self
    }

    /// Register an already built mapper, replacing any cached one
    pub fn add<E: Entity>(&self, mapper: ObjectRelationalMapper<E>) -> Rc<ObjectRelationalMapper<E>> {
        let mapper = Rc::new(mapper);
        let erased: Rc<dyn RelatedMapper> = Rc::clone(&mapper) as Rc<dyn RelatedMapper>;
        self.mappers.borrow_mut().insert(TypeId::of::<E>(), erased);
        mapper
    }

    /// The mapper for `E`, built on first request and cached afterwards
    ///
    /// Construction uses the factory registered with
    /// [`MapperManager::configure`], else [`ObjectRelationalMapper::new`].
    pub fn get<E: Mapped>(&self) -> Result<Rc<ObjectRelationalMapper<E>>, MapperError> {
        let key = TypeId::of::<E>();

        let cached = self.mappers.borrow().get(&key).cloned();
        if let Some(mapper) = cached {
            return downcast(mapper);
        }

        let factory = self.factories.borrow().get(&key).cloned();
        let mapper: Rc<dyn RelatedMapper> = match factory {
            Some(factory) => factory(self.data_source(), self)?,
            None => Rc::new(ObjectRelationalMapper::<E>::new(self.data_source(), self)?),
        };
        debug!("Created mapper for {}", type_name::<E>());

        let mapper = Rc::clone(self.mappers.borrow_mut().entry(key).or_insert(mapper));
        downcast(mapper)
    }

    /// Whether a mapper for `E` has been built or added
    pub fn contains<E: Entity>(&self) -> bool {
        self.mappers.borrow().contains_key(&TypeId::of::<E>())
    }

    pub(crate) fn downgrade(&self) -> Weak<MapperManager> {
        Weak::clone(&self.this)
    }
}

fn downcast<E: Entity>(
    mapper: Rc<dyn RelatedMapper>,
) -> Result<Rc<ObjectRelationalMapper<E>>, MapperError> {
    mapper
        .into_any()
        .downcast::<ObjectRelationalMapper<E>>()
        .map_err(|_| {
            MapperError::Configuration(format!(
                "Mapper registered for {} has an unexpected type",
                type_name::<E>()
            ))
        })
}

impl fmt::Debug for MapperManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperManager")
            .field("mappers", &self.mappers.borrow().len())
            .field("factories", &self.factories.borrow().len())
            .finish()
    }
}

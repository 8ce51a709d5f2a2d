//! Object-relational mapper
//!
//! Extends the data mapper with associations. Related entities are never
//! joined: each requested association costs one extra read through the
//! related mapper (two for belongsToMany, which first reads its join table),
//! batched over every parent with an `IN` criterion. Going through the
//! related mapper keeps its hooks in play.

use crate::association::{Association, AssociationKind, Cardinality, RelatedMapper};
use crate::hooks::Hooks;
use crate::manager::MapperManager;
use crate::mapper::{DataMapper, Mapper};
use crate::schema::MapperSchema;
use crate::MapperError;
use quarry_domain::{
    Criteria, Entity, QueryObject, QueryOptions, Related, Row, SharedDataSource, Value,
};
use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, info};

/// Static mapping configuration of an entity type
///
/// Used by [`MapperManager::get`] to build the default mapper for a type.
pub trait Mapped: Entity {
    /// Table, primary key and whitelist
    fn schema() -> MapperSchema;

    /// Associations to other mapped types
    fn associations() -> Vec<Association> {
        Vec::new()
    }

    /// Register lifecycle hooks on a new mapper
    fn configure_hooks(hooks: &mut Hooks<Self>) {
        let _ = hooks;
    }
}

/// Mapper with associations, eager loading and cascading deletes
pub struct ObjectRelationalMapper<E: Entity> {
    mapper: DataMapper<E>,
    associations: Vec<Association>,
    manager: Weak<MapperManager>,
}

impl<E: Mapped> ObjectRelationalMapper<E> {
    /// Build the mapper described by `E`'s [`Mapped`] implementation
    pub fn new(data_source: SharedDataSource, manager: &MapperManager) -> Result<Self, MapperError> {
        let mut mapper = DataMapper::new(E::schema(), data_source)?;
        E::configure_hooks(mapper.hooks_mut());
        Self::with_mapper(mapper, E::associations(), manager)
    }
}

impl<E: Entity> ObjectRelationalMapper<E> {
    /// Build from an explicit data mapper and association list
    ///
    /// Every association is validated here; associations resolve in the
    /// order belongsTo, hasMany, hasOne, belongsToMany.
    pub fn with_mapper(
        mapper: DataMapper<E>,
        mut associations: Vec<Association>,
        manager: &MapperManager,
    ) -> Result<Self, MapperError> {
        mapper.schema().validate()?;
        for association in &associations {
            association.validate()?;
        }
        associations.sort_by_key(|a| a.kind().rank());

        Ok(Self {
            mapper,
            associations,
            manager: manager.downgrade(),
        })
    }

    /// Registered hooks, for adding callbacks
    pub fn hooks_mut(&mut self) -> &mut Hooks<E> {
        self.mapper.hooks_mut()
    }

    /// Validated associations in resolution order
    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    /// Association assigned to a property
    pub fn association(&self, property_name: &str) -> Option<&Association> {
        self.associations
            .iter()
            .find(|a| a.property_name() == property_name)
    }

    fn manager(&self) -> Result<Rc<MapperManager>, MapperError> {
        self.manager.upgrade().ok_or_else(|| {
            MapperError::Configuration("Mapper manager is no longer available".to_string())
        })
    }

    /// Read raw rows and entities, then eager-load `options.with`
    fn read_with_rows(&self, mut query: QueryObject) -> Result<(Vec<Row>, Vec<E>), MapperError> {
        let rows = self.mapper.read_rows(&mut query)?;
        let mut entities = self.mapper.hydrate(&rows)?;

        let with = &query.options().with;
        if !with.is_empty() && !entities.is_empty() {
            self.load_related_data(&rows, &mut entities, with)?;
        }
        Ok((rows, entities))
    }

    fn load_related_data(
        &self,
        rows: &[Row],
        entities: &mut [E],
        with: &[String],
    ) -> Result<(), MapperError> {
        let manager = self.manager()?;
        let primary_key = self.mapper.schema().binding_key()?;
        let parent_keys: Vec<Value> = rows.iter().map(|row| field(row, primary_key)).collect();

        for association in self
            .associations
            .iter()
            .filter(|a| with.iter().any(|w| w == a.property_name()))
        {
            let related = association.resolve(&manager)?;
            let foreign_key = association.foreign_key_field();

            let (match_field, groups): (String, Vec<Vec<Value>>) = match association.kind() {
                AssociationKind::BelongsTo => (
                    related.binding_key()?,
                    rows.iter().map(|row| vec![field(row, foreign_key)]).collect(),
                ),
                AssociationKind::HasOne | AssociationKind::HasMany => (
                    foreign_key.to_string(),
                    parent_keys.iter().map(|key| vec![key.clone()]).collect(),
                ),
                AssociationKind::BelongsToMany => (
                    related.binding_key()?,
                    self.join_groups(association, &parent_keys)?,
                ),
            };

            debug!(
                "Eager loading {} `{}` from `{}` for {} rows",
                association.kind(),
                association.property_name(),
                related.table_name(),
                rows.len()
            );

            let results = related.load_related(association, &match_field, &groups)?;
            for (entity, result) in entities.iter_mut().zip(results) {
                entity.set_related(association.property_name(), result)?;
            }
        }
        Ok(())
    }

    /// Target ids per parent, read from the join table in one pass
    fn join_groups(
        &self,
        association: &Association,
        parent_keys: &[Value],
    ) -> Result<Vec<Vec<Value>>, MapperError> {
        let foreign_key = association.foreign_key_field();
        let other_foreign_key = association.other_foreign_key_field();

        let keys = distinct(parent_keys.iter().cloned());
        if keys.is_empty() {
            return Ok(vec![Vec::new(); parent_keys.len()]);
        }

        let query = QueryObject::with_criteria(Criteria::new().and(foreign_key, Value::List(keys)));
        let join_rows = self
            .mapper
            .data_source()
            .borrow()
            .read(association.join_table_name(), &query)?;

        Ok(parent_keys
            .iter()
            .map(|key| {
                if key.is_null() {
                    return Vec::new();
                }
                join_rows
                    .iter()
                    .filter(|join| field(join, foreign_key).loose_eq(key))
                    .map(|join| field(join, other_foreign_key))
                    .collect()
            })
            .collect())
    }

    /// Delete what dependent associations hold for a deleted owner
    fn delete_dependent(&self, id: &Value) -> Result<(), MapperError> {
        let dependent: Vec<&Association> =
            self.associations.iter().filter(|a| a.is_dependent()).collect();
        if dependent.is_empty() {
            return Ok(());
        }

        let manager = self.manager()?;
        for kind in [AssociationKind::HasOne, AssociationKind::HasMany] {
            for association in dependent.iter().filter(|a| a.kind() == kind) {
                let related = association.resolve(&manager)?;
                let criteria = Criteria::new().and(association.foreign_key_field(), id.clone());
                let deleted = related.delete_related(criteria)?;
                info!(
                    "Cascade deleted {} rows from `{}` through {} `{}`",
                    deleted,
                    related.table_name(),
                    kind,
                    association.property_name()
                );
            }
        }

        for association in dependent
            .iter()
            .filter(|a| a.kind() == AssociationKind::BelongsToMany)
        {
            let query = QueryObject::with_criteria(
                Criteria::new().and(association.foreign_key_field(), id.clone()),
            );
            let deleted = self
                .mapper
                .data_source()
                .borrow_mut()
                .delete(association.join_table_name(), &query)?;
            info!(
                "Cascade deleted {} join rows from `{}` through belongsToMany `{}`",
                deleted,
                association.join_table_name(),
                association.property_name()
            );
        }
        Ok(())
    }
}

fn field(row: &Row, name: &str) -> Value {
    row.get(name).cloned().unwrap_or(Value::Null)
}

/// Non-null values without duplicates, first occurrence wins
fn distinct(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::new();
    for value in values {
        if !value.is_null() && !unique.iter().any(|u| u.loose_eq(&value)) {
            unique.push(value);
        }
    }
    unique
}

impl<E: Entity> Mapper for ObjectRelationalMapper<E> {
    type Entity = E;

    fn data_mapper(&self) -> &DataMapper<E> {
        &self.mapper
    }

    fn read(&self, query: QueryObject) -> Result<Vec<E>, MapperError> {
        let (_, entities) = self.read_with_rows(query)?;
        Ok(entities)
    }

    /// Delete, then cascade through dependent associations
    ///
    /// The cascade only runs for a single-field primary key.
    fn delete(&self, entity: &E) -> Result<bool, MapperError> {
        let deleted = self.mapper.delete(entity)?;

        if deleted {
            if let Some(key) = self.mapper.schema().single_primary_key() {
                if let Some(id) = entity.field(key).filter(|id| !id.is_null()) {
                    self.delete_dependent(&id)?;
                }
            }
        }
        Ok(deleted)
    }
}

impl<E: Entity> RelatedMapper for ObjectRelationalMapper<E> {
    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn table_name(&self) -> &str {
        self.mapper.schema().table()
    }

    fn binding_key(&self) -> Result<String, MapperError> {
        self.mapper.schema().binding_key().map(str::to_string)
    }

    fn load_related(
        &self,
        association: &Association,
        match_field: &str,
        groups: &[Vec<Value>],
    ) -> Result<Vec<Related>, MapperError> {
        let cardinality = association.kind().cardinality();

        let keys = distinct(groups.iter().flatten().cloned());
        if keys.is_empty() {
            return Ok(groups.iter().map(|_| cardinality.empty()).collect());
        }

        let mut criteria = association.conditions.clone();
        criteria.insert(match_field, Value::List(keys));

        let mut fields = association.fields.clone();
        if !fields.is_empty() && !fields.iter().any(|f| f == match_field) {
            fields.push(match_field.to_string());
        }
        let options = QueryOptions {
            fields,
            order: association.order.clone(),
            ..QueryOptions::default()
        };

        let (rows, entities) = self.read_with_rows(QueryObject::new(criteria, options))?;

        Ok(groups
            .iter()
            .map(|group| {
                let mut matched = rows
                    .iter()
                    .zip(&entities)
                    .filter(|(row, _)| {
                        let value = field(row, match_field);
                        group.iter().any(|g| !g.is_null() && g.loose_eq(&value))
                    })
                    .map(|(_, entity)| Box::new(entity.clone()) as Box<dyn Any>);

                match cardinality {
                    Cardinality::One => Related::One(matched.next()),
                    Cardinality::Many => Related::Many(matched.collect()),
                }
            })
            .collect())
    }

    fn delete_related(&self, criteria: Criteria) -> Result<usize, MapperError> {
        let entities = self.find_all_by(criteria, QueryOptions::new())?;

        let mut deleted = 0;
        for entity in &entities {
            if self.delete(entity)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl<E: Entity> fmt::Debug for ObjectRelationalMapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRelationalMapper")
            .field("mapper", &self.mapper)
            .field("associations", &self.associations)
            .finish()
    }
}

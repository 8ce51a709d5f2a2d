//! Data mapper: moves entities between their objects and storage rows
//!
//! [`DataMapper`] holds the per-type configuration (schema, hooks, data
//! source) and the persisted table. The [`Mapper`] trait exposes the public
//! finder and persistence surface on top of it; implementors that extend
//! reading or deleting (see
//! [`ObjectRelationalMapper`](crate::ObjectRelationalMapper)) override
//! [`Mapper::read`] and [`Mapper::delete`] and every finder follows.

use crate::hooks::Hooks;
use crate::list::{FieldList, ListFields};
use crate::schema::MapperSchema;
use crate::MapperError;
use quarry_domain::{
    Criteria, Entity, EntityHandle, QueryObject, QueryOption, QueryOptions, Row, SharedDataSource,
    WeakEntityHandle,
};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;

/// Options for [`Mapper::create_entity`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityOptions {
    /// Fields taken from the data; `None` means the mapper's whitelist
    pub fields: Option<Vec<String>>,
    /// Mark the new entity as persisted
    pub persisted: bool,
}

impl EntityOptions {
    /// Default options: whitelist fields, not persisted
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the fields taken from the data
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Mark the new entity as persisted
    pub fn persisted(mut self, persisted: bool) -> Self {
        self.persisted = persisted;
        self
    }
}

/// Table size below which dead handles are never swept
const MIN_SWEEP: usize = 64;

/// Handles of persisted entities, held weakly
///
/// Entries whose entity has been dropped are swept once the table reaches
/// twice its size after the previous sweep.
#[derive(Debug)]
struct PersistedTable {
    entries: HashMap<u128, WeakEntityHandle>,
    sweep_at: usize,
}

impl PersistedTable {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            sweep_at: MIN_SWEEP,
        }
    }

    fn contains(&self, handle: &EntityHandle) -> bool {
        self.entries.contains_key(&handle.value())
    }

    fn insert(&mut self, handle: &EntityHandle) {
        if self.entries.len() >= self.sweep_at {
            self.sweep();
        }
        self.entries.insert(handle.value(), handle.downgrade());
    }

    fn remove(&mut self, handle: &EntityHandle) {
        self.entries.remove(&handle.value());
    }

    fn sweep(&mut self) {
        self.entries.retain(|_, handle| handle.is_alive());
        self.sweep_at = (self.entries.len() * 2).max(MIN_SWEEP);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Configuration and state of the mapper for one entity type
///
/// Persisted tracking is keyed by [`EntityHandle`]: an entity is persisted
/// once this mapper created or read it, and stops being persisted when this
/// mapper deletes it. The mapper never keeps a dropped entity's handle
/// alive.
pub struct DataMapper<E: Entity> {
    schema: MapperSchema,
    data_source: SharedDataSource,
    hooks: Hooks<E>,
    persisted: RefCell<PersistedTable>,
}

impl<E: Entity> DataMapper<E> {
    /// Create a mapper over a data source
    ///
    /// Fails with [`MapperError::Configuration`] when the schema has no
    /// primary key.
    pub fn new(schema: MapperSchema, data_source: SharedDataSource) -> Result<Self, MapperError> {
        schema.validate()?;
        Ok(Self {
            schema,
            data_source,
            hooks: Hooks::new(),
            persisted: RefCell::new(PersistedTable::new()),
        })
    }

    /// Replace the hooks, builder style
    pub fn with_hooks(mut self, hooks: Hooks<E>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Table, primary key and whitelist
    pub fn schema(&self) -> &MapperSchema {
        &self.schema
    }

    /// Registered hooks
    pub fn hooks(&self) -> &Hooks<E> {
        &self.hooks
    }

    /// Registered hooks, for adding callbacks
    pub fn hooks_mut(&mut self) -> &mut Hooks<E> {
        &mut self.hooks
    }

    /// Primary key fields
    pub fn primary_key(&self) -> &[String] {
        self.schema.primary_key()
    }

    /// The data source this mapper writes to
    pub fn data_source(&self) -> SharedDataSource {
        SharedDataSource::clone(&self.data_source)
    }

    /// Whether this mapper considers the entity stored
    pub fn is_persisted(&self, entity: &E) -> bool {
        self.persisted.borrow().contains(entity.handle())
    }

    /// Record or clear the persisted state of an entity
    pub fn mark_persisted(&self, entity: &E, persisted: bool) {
        let mut table = self.persisted.borrow_mut();
        if persisted {
            table.insert(entity.handle());
        } else {
            table.remove(entity.handle());
        }
    }

    /// Number of tracked handles, including dead ones not yet swept
    pub fn persisted_len(&self) -> usize {
        self.persisted.borrow().len()
    }

    /// Build an entity from a row, ignoring fields outside the whitelist
    pub fn map_data_to_entity(&self, row: &Row) -> Result<E, MapperError> {
        let mut entity = E::default();
        for (field, value) in row {
            if self.schema.has_field(field) {
                entity.set_field(field, value.clone())?;
            }
        }
        Ok(entity)
    }

    /// Whitelisted, initialized fields of an entity as a row
    pub fn map_entity_to_data(&self, entity: &E) -> Row {
        self.schema
            .fields()
            .iter()
            .filter_map(|field| entity.field(field).map(|value| (field.clone(), value)))
            .collect()
    }

    /// Build an entity from caller data
    pub fn create_entity(&self, mut row: Row, options: EntityOptions) -> Result<E, MapperError> {
        if let Some(fields) = &options.fields {
            row.retain(|field, _| fields.contains(field));
        }

        let entity = self.map_data_to_entity(&row)?;
        if options.persisted {
            self.mark_persisted(&entity, true);
        }
        Ok(entity)
    }

    /// Build one entity per row
    pub fn create_entities(&self, rows: Vec<Row>, options: EntityOptions) -> Result<Vec<E>, MapperError> {
        rows.into_iter()
            .map(|row| self.create_entity(row, options.clone()))
            .collect()
    }

    /// Build a query object
    pub fn create_query_object(&self, criteria: Criteria, options: QueryOptions) -> QueryObject {
        QueryObject::new(criteria, options)
    }

    /// Read raw rows, running the find hooks
    ///
    /// `before_find` may rewrite the query in place; a veto yields no rows.
    /// Without explicit `fields` the whitelist is used as projection.
    pub fn read_rows(&self, query: &mut QueryObject) -> Result<Vec<Row>, MapperError> {
        if !self.hooks.run_before_find(query) {
            debug!("Read from `{}` vetoed by before_find", self.schema.table());
            return Ok(Vec::new());
        }

        if query.options().fields.is_empty() && !self.schema.fields().is_empty() {
            query.set_option(QueryOption::Fields(self.schema.fields().to_vec()));
        }

        let mut rows = self.data_source.borrow().read(self.schema.table(), query)?;
        debug!("Read {} rows from `{}`", rows.len(), self.schema.table());

        if !rows.is_empty() {
            self.hooks.run_after_find(&mut rows, query);
        }
        Ok(rows)
    }

    /// Map rows to entities and mark them persisted
    pub fn hydrate(&self, rows: &[Row]) -> Result<Vec<E>, MapperError> {
        rows.iter()
            .map(|row| {
                let entity = self.map_data_to_entity(row)?;
                self.mark_persisted(&entity, true);
                Ok(entity)
            })
            .collect()
    }

    /// Base read: rows through the find hooks, mapped to entities
    pub fn read(&self, mut query: QueryObject) -> Result<Vec<E>, MapperError> {
        let rows = self.read_rows(&mut query)?;
        self.hydrate(&rows)
    }

    /// Count matching rows; `before_find` applies and a veto counts zero
    pub fn find_count(&self, query: &QueryObject) -> Result<usize, MapperError> {
        let mut query = query.clone();
        if !self.hooks.run_before_find(&mut query) {
            debug!("Count on `{}` vetoed by before_find", self.schema.table());
            return Ok(0);
        }

        let count = self.data_source.borrow().count(self.schema.table(), &query)?;
        debug!("Counted {} rows in `{}`", count, self.schema.table());
        Ok(count)
    }

    /// Build a list from raw rows
    pub fn find_list(&self, query: &QueryObject, fields: &ListFields) -> Result<FieldList, MapperError> {
        let key_field = match &fields.key_field {
            Some(key) => key.clone(),
            None => self
                .schema
                .single_primary_key()
                .map(str::to_string)
                .ok_or_else(|| {
                    MapperError::InvalidArgument("Cannot determine primary key".to_string())
                })?,
        };

        let mut query = query.clone();
        let rows = self.read_rows(&mut query)?;

        Ok(FieldList::from_rows(
            &rows,
            &key_field,
            fields.value_field.as_deref(),
            fields.group_field.as_deref(),
        ))
    }

    /// Create or update depending on the persisted state
    pub fn save(&self, entity: &mut E) -> Result<bool, MapperError> {
        if !self.hooks.run_before_save(entity) {
            debug!("Save to `{}` vetoed by before_save", self.schema.table());
            return Ok(false);
        }

        let saved = if self.is_persisted(entity) {
            self.update(entity)?
        } else {
            self.create(entity)?
        };

        if saved {
            self.mark_persisted(entity, true);
            self.hooks.run_after_save(entity);
        }
        Ok(saved)
    }

    fn create(&self, entity: &mut E) -> Result<bool, MapperError> {
        if !self.hooks.run_before_create(entity) {
            debug!("Create in `{}` vetoed by before_create", self.schema.table());
            return Ok(false);
        }

        let row = self.map_entity_to_data(entity);
        let created = self
            .data_source
            .borrow_mut()
            .create(self.schema.table(), row)?;
        debug!("Created row in `{}`: {}", self.schema.table(), created);

        if created {
            let generated = self.data_source.borrow().generated_id();
            if let (Some(id), Some(key)) = (generated, self.schema.single_primary_key()) {
                if !id.is_null() {
                    entity.set_field(key, id)?;
                }
            }
            self.hooks.run_after_create(entity);
        }
        Ok(created)
    }

    fn update(&self, entity: &mut E) -> Result<bool, MapperError> {
        if !self.hooks.run_before_update(entity) {
            debug!("Update of `{}` vetoed by before_update", self.schema.table());
            return Ok(false);
        }

        let row = self.map_entity_to_data(entity);
        let query = QueryObject::with_criteria(self.conditions_from_state(&row)?);
        let affected = self
            .data_source
            .borrow_mut()
            .update(self.schema.table(), &query, row)?;
        debug!("Updated {} rows in `{}`", affected, self.schema.table());

        let updated = affected == 1;
        if updated {
            self.hooks.run_after_update(entity);
        }
        Ok(updated)
    }

    /// Base delete of a single entity by its primary key
    pub fn delete(&self, entity: &E) -> Result<bool, MapperError> {
        if !self.hooks.run_before_delete(entity) {
            debug!("Delete from `{}` vetoed by before_delete", self.schema.table());
            return Ok(false);
        }

        let row = self.map_entity_to_data(entity);
        let query = QueryObject::with_criteria(self.conditions_from_state(&row)?);
        let removed = self
            .data_source
            .borrow_mut()
            .delete(self.schema.table(), &query)?;
        debug!("Deleted {} rows from `{}`", removed, self.schema.table());

        let deleted = removed == 1;
        if deleted {
            self.mark_persisted(entity, false);
            self.hooks.run_after_delete(entity);
        }
        Ok(deleted)
    }

    /// Merge `row` into every match, bypassing hooks
    pub fn update_all(&self, query: &QueryObject, row: Row) -> Result<usize, MapperError> {
        if row.is_empty() {
            return Err(MapperError::InvalidArgument("Data cannot be empty".to_string()));
        }

        let affected = self
            .data_source
            .borrow_mut()
            .update(self.schema.table(), query, row)?;
        debug!("Bulk updated {} rows in `{}`", affected, self.schema.table());
        Ok(affected)
    }

    /// Remove every match, bypassing hooks
    pub fn delete_all(&self, query: &QueryObject) -> Result<usize, MapperError> {
        let removed = self
            .data_source
            .borrow_mut()
            .delete(self.schema.table(), query)?;
        debug!("Bulk deleted {} rows from `{}`", removed, self.schema.table());
        Ok(removed)
    }

    /// Primary-key criteria for a row; every key needs a non-null value
    fn conditions_from_state(&self, row: &Row) -> Result<Criteria, MapperError> {
        self.schema.validate()?;

        let mut criteria = Criteria::new();
        for key in self.schema.primary_key() {
            match row.get(key) {
                Some(value) if !value.is_null() => criteria.insert(key.clone(), value.clone()),
                _ => return Err(MapperError::MissingPrimaryKey(key.clone())),
            }
        }
        Ok(criteria)
    }
}

impl<E: Entity> std::fmt::Debug for DataMapper<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataMapper")
            .field("schema", &self.schema)
            .field("hooks", &self.hooks)
            .field("persisted", &self.persisted.borrow().len())
            .finish()
    }
}

/// Finder and persistence surface shared by every mapper
///
/// Only [`Mapper::data_mapper`] is required. Finders are built on
/// [`Mapper::read`], so overriding it changes every finder.
pub trait Mapper {
    /// Entity type this mapper handles
    type Entity: Entity;

    /// Underlying configuration and persisted state
    fn data_mapper(&self) -> &DataMapper<Self::Entity>;

    /// Read entities for a query
    fn read(&self, query: QueryObject) -> Result<Vec<Self::Entity>, MapperError> {
        self.data_mapper().read(query)
    }

    /// Delete an entity; `Ok(true)` when exactly one row was removed
    fn delete(&self, entity: &Self::Entity) -> Result<bool, MapperError> {
        self.data_mapper().delete(entity)
    }

    /// First match, or [`MapperError::EntityNotFound`]
    fn get(&self, query: &QueryObject) -> Result<Self::Entity, MapperError> {
        self.find(query)?.ok_or(MapperError::EntityNotFound)
    }

    /// [`Mapper::get`] from criteria and options
    fn get_by(&self, criteria: Criteria, options: QueryOptions) -> Result<Self::Entity, MapperError> {
        self.get(&self.create_query_object(criteria, options))
    }

    /// First match; the caller's query is left untouched
    fn find(&self, query: &QueryObject) -> Result<Option<Self::Entity>, MapperError> {
        let mut query = query.clone();
        query.set_option(QueryOption::Limit(Some(1)));
        Ok(self.read(query)?.into_iter().next())
    }

    /// [`Mapper::find`] from criteria and options
    fn find_by(
        &self,
        criteria: Criteria,
        options: QueryOptions,
    ) -> Result<Option<Self::Entity>, MapperError> {
        self.find(&self.create_query_object(criteria, options))
    }

    /// Every match
    fn find_all(&self, query: &QueryObject) -> Result<Vec<Self::Entity>, MapperError> {
        self.read(query.clone())
    }

    /// [`Mapper::find_all`] from criteria and options
    fn find_all_by(
        &self,
        criteria: Criteria,
        options: QueryOptions,
    ) -> Result<Vec<Self::Entity>, MapperError> {
        self.find_all(&self.create_query_object(criteria, options))
    }

    /// Number of matches
    fn find_count(&self, query: &QueryObject) -> Result<usize, MapperError> {
        self.data_mapper().find_count(query)
    }

    /// [`Mapper::find_count`] from criteria and options
    fn find_count_by(&self, criteria: Criteria, options: QueryOptions) -> Result<usize, MapperError> {
        self.find_count(&self.create_query_object(criteria, options))
    }

    /// Values, key/value map or grouped map of raw row fields
    fn find_list(&self, query: &QueryObject, fields: &ListFields) -> Result<FieldList, MapperError> {
        self.data_mapper().find_list(query, fields)
    }

    /// [`Mapper::find_list`] from criteria and options
    fn find_list_by(
        &self,
        criteria: Criteria,
        fields: &ListFields,
        options: QueryOptions,
    ) -> Result<FieldList, MapperError> {
        self.find_list(&self.create_query_object(criteria, options), fields)
    }

    /// Create or update; `Ok(false)` on veto or when storage reports failure
    fn save(&self, entity: &mut Self::Entity) -> Result<bool, MapperError> {
        self.data_mapper().save(entity)
    }

    /// Save in order, stopping at the first failure; nothing is rolled back
    fn save_many<'a, I>(&self, entities: I) -> Result<bool, MapperError>
    where
        I: IntoIterator<Item = &'a mut Self::Entity>,
    {
        for entity in entities {
            if !self.save(entity)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Delete in order, stopping at the first failure; nothing is rolled back
    fn delete_many<'a, I>(&self, entities: I) -> Result<bool, MapperError>
    where
        I: IntoIterator<Item = &'a Self::Entity>,
    {
        for entity in entities {
            if !self.delete(entity)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Merge `row` into every match without hooks
    fn update_all(&self, query: &QueryObject, row: Row) -> Result<usize, MapperError> {
        self.data_mapper().update_all(query, row)
    }

    /// [`Mapper::update_all`] from criteria and options
    fn update_all_by(
        &self,
        criteria: Criteria,
        row: Row,
        options: QueryOptions,
    ) -> Result<usize, MapperError> {
        self.update_all(&self.create_query_object(criteria, options), row)
    }

    /// Remove every match without hooks
    fn delete_all(&self, query: &QueryObject) -> Result<usize, MapperError> {
        self.data_mapper().delete_all(query)
    }

    /// [`Mapper::delete_all`] from criteria and options
    fn delete_all_by(&self, criteria: Criteria, options: QueryOptions) -> Result<usize, MapperError> {
        self.delete_all(&self.create_query_object(criteria, options))
    }

    /// Build an entity from caller data
    fn create_entity(&self, row: Row, options: EntityOptions) -> Result<Self::Entity, MapperError> {
        self.data_mapper().create_entity(row, options)
    }

    /// Build one entity per row
    fn create_entities(
        &self,
        rows: Vec<Row>,
        options: EntityOptions,
    ) -> Result<Vec<Self::Entity>, MapperError> {
        self.data_mapper().create_entities(rows, options)
    }

    /// Build a query object
    fn create_query_object(&self, criteria: Criteria, options: QueryOptions) -> QueryObject {
        self.data_mapper().create_query_object(criteria, options)
    }

    /// Primary key fields
    fn primary_key(&self) -> &[String] {
        self.data_mapper().primary_key()
    }

    /// The data source this mapper writes to
    fn data_source(&self) -> SharedDataSource {
        self.data_mapper().data_source()
    }

    /// Whether this mapper considers the entity stored
    fn is_persisted(&self, entity: &Self::Entity) -> bool {
        self.data_mapper().is_persisted(entity)
    }

    /// Record or clear the persisted state of an entity
    fn mark_persisted(&self, entity: &Self::Entity, persisted: bool) {
        self.data_mapper().mark_persisted(entity, persisted)
    }

    /// Number of tracked handles, including dead ones not yet swept
    fn persisted_len(&self) -> usize {
        self.data_mapper().persisted_len()
    }

    /// Build an entity from a row, ignoring fields outside the whitelist
    fn map_data_to_entity(&self, row: &Row) -> Result<Self::Entity, MapperError> {
        self.data_mapper().map_data_to_entity(row)
    }

    /// Whitelisted, initialized fields of an entity as a row
    fn map_entity_to_data(&self, entity: &Self::Entity) -> Row {
        self.data_mapper().map_entity_to_data(entity)
    }
}

impl<E: Entity> Mapper for DataMapper<E> {
    type Entity = E;

    fn data_mapper(&self) -> &DataMapper<E> {
        self
    }
}

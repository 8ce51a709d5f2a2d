//! In-memory reference data source
//!
//! Defines the exact filtering, sorting and pagination semantics expected of
//! any `DataSource`:
//!
//! 1. rows are sorted by `options.order` (stable, first key is primary)
//! 2. every criteria key is tested against the sorted rows (logical AND)
//! 3. `options.offset` matches are skipped, then up to `options.limit` taken
//!
//! Identifiers are generated per collection, counting up from the configured
//! auto-increment and skipping values already present in the id field.

use crate::{FixtureSet, StoreConfig, StoreError};
use indexmap::IndexMap;
use quarry_domain::{ConditionSet, DataSource, DataSourceError, QueryObject, Row, Value};
use std::collections::HashSet;
use tracing::{debug, info};

/// Rows of one collection plus its identifier counter
#[derive(Debug, Clone, Default)]
struct Collection {
    rows: Vec<Row>,
    auto_increment: i64,
}

impl Collection {
    fn new(auto_increment: i64) -> Self {
        Self {
            rows: Vec::new(),
            auto_increment,
        }
    }

    fn contains_id(&self, id_field: &str, id: &Value) -> bool {
        self.rows
            .iter()
            .any(|row| row.get(id_field).is_some_and(|v| v.loose_eq(id)))
    }

    fn next_id(&mut self, id_field: &str) -> i64 {
        loop {
            self.auto_increment += 1;
            if !self.contains_id(id_field, &Value::Int(self.auto_increment)) {
                return self.auto_increment;
            }
        }
    }
}

/// In-memory implementation of `DataSource`
///
/// Development and test grade: every query scans its collection.
///
/// # Thread Safety
///
/// Not synchronized. Share it between mappers through
/// [`quarry_domain::shared`], on a single thread.
#[derive(Debug, Clone)]
pub struct MemoryDataSource {
    collections: IndexMap<String, Collection>,
    id_field: String,
    auto_increment: i64,
    last_generated_id: Option<Value>,
}

impl MemoryDataSource {
    /// Create an empty data source with the default configuration
    pub fn new() -> Self {
        Self {
            collections: IndexMap::new(),
            id_field: "id".to_string(),
            auto_increment: 0,
            last_generated_id: None,
        }
    }

    /// Create a data source from configuration, loading its fixture files
    pub fn with_config(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;

        let mut store = Self {
            collections: IndexMap::new(),
            id_field: config.id_field.clone(),
            auto_increment: config.auto_increment,
            last_generated_id: None,
        };

        for path in &config.fixtures {
            let fixtures = FixtureSet::load(path)?;
            info!(
                "Loaded {} fixture rows from {}",
                fixtures.row_count(),
                path.display()
            );
            store.load_fixtures(fixtures);
        }

        Ok(store)
    }

    /// Set the counter every new collection starts from
    pub fn with_auto_increment(mut self, auto_increment: i64) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    /// Seed collections with rows as-is; identifiers are not generated
    pub fn load_fixtures(&mut self, fixtures: FixtureSet) {
        for (name, rows) in fixtures {
            let auto_increment = self.auto_increment;
            self.collections
                .entry(name)
                .or_insert_with(|| Collection::new(auto_increment))
                .rows
                .extend(rows);
        }
    }

    /// Field that receives generated identifiers
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// All rows of a collection in storage order
    pub fn rows(&self, collection: &str) -> &[Row] {
        self.collections
            .get(collection)
            .map(|c| c.rows.as_slice())
            .unwrap_or(&[])
    }

    /// Names of the collections that exist
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Indices of the rows matching the query, in result order
    fn matching(
        &self,
        collection: &str,
        query: &QueryObject,
        sort: bool,
    ) -> Result<Vec<usize>, StoreError> {
        let rows = self.rows(collection);
        let options = query.options();
        let conditions = ConditionSet::parse(query.criteria())?;

        let mut indices: Vec<usize> = (0..rows.len()).collect();

        if sort && !options.order.is_empty() {
            for field in options.order.keys() {
                if rows.iter().any(|row| !row.contains_key(field)) {
                    return Err(StoreError::UnknownSortField(field.clone()));
                }
            }

            indices.sort_by(|&a, &b| {
                options
                    .order
                    .iter()
                    .map(|(field, direction)| {
                        let ordering = rows[a][field].sort_cmp(&rows[b][field]);
                        match direction {
                            quarry_domain::Direction::Asc => ordering,
                            quarry_domain::Direction::Desc => ordering.reverse(),
                        }
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let matched = indices
            .into_iter()
            .filter(|&i| conditions.matches(&rows[i]))
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();

        Ok(matched)
    }
}

impl Default for MemoryDataSource {
    fn default() -> Self {
        Self::new()
    }
}

fn project(row: &Row, fields: &[String]) -> Row {
    if fields.is_empty() {
        return row.clone();
    }
    row.iter()
        .filter(|(k, _)| fields.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl DataSource for MemoryDataSource {
    fn create(&mut self, collection: &str, mut row: Row) -> Result<bool, DataSourceError> {
        let auto_increment = self.auto_increment;
        let coll = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(auto_increment));

        match row.get(&self.id_field).filter(|id| !id.is_null()) {
            Some(id) => {
                if coll.contains_id(&self.id_field, id) {
                    return Err(StoreError::DuplicateKey {
                        collection: collection.to_string(),
                        id: id.clone(),
                    }
                    .into());
                }
                self.last_generated_id = None;
            }
            None => {
                let id = coll.next_id(&self.id_field);
                row.insert(self.id_field.clone(), Value::Int(id));
                self.last_generated_id = Some(Value::Int(id));
            }
        }

        coll.rows.push(row);
        debug!("Created row in `{}`", collection);

        Ok(true)
    }

    fn read(&self, collection: &str, query: &QueryObject) -> Result<Vec<Row>, DataSourceError> {
        let indices = self.matching(collection, query, true)?;
        let rows = self.rows(collection);
        let fields = &query.options().fields;

        let result: Vec<Row> = indices.into_iter().map(|i| project(&rows[i], fields)).collect();
        debug!("Read {} rows from `{}`", result.len(), collection);

        Ok(result)
    }

    fn update(
        &mut self,
        collection: &str,
        query: &QueryObject,
        row: Row,
    ) -> Result<usize, DataSourceError> {
        let indices = self.matching(collection, query, true)?;
        self.last_generated_id = None;

        let Some(coll) = self.collections.get_mut(collection) else {
            return Ok(0);
        };

        for &i in &indices {
            for (field, value) in &row {
                coll.rows[i].insert(field.clone(), value.clone());
            }
        }

        debug!("Updated {} rows in `{}`", indices.len(), collection);
        Ok(indices.len())
    }

    fn delete(&mut self, collection: &str, query: &QueryObject) -> Result<usize, DataSourceError> {
        let indices: HashSet<usize> = self.matching(collection, query, true)?.into_iter().collect();
        self.last_generated_id = None;

        let Some(coll) = self.collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut position = 0;
        coll.rows.retain(|_| {
            let keep = !indices.contains(&position);
            position += 1;
            keep
        });

        debug!("Deleted {} rows from `{}`", indices.len(), collection);
        Ok(indices.len())
    }

    fn count(&self, collection: &str, query: &QueryObject) -> Result<usize, DataSourceError> {
        // Projection, order and group have no effect on how many rows match
        Ok(self.matching(collection, query, false)?.len())
    }

    fn generated_id(&self) -> Option<Value> {
        self.last_generated_id.clone()
    }
}

//! Trait definitions for external interactions
//!
//! These traits define the boundary between the mapping layers and storage.
//! Storage implementations live in other crates (quarry-store).

use crate::error::DataSourceError;
use crate::query::QueryObject;
use crate::value::{Row, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Physical storage behind the mappers
///
/// Every operation is keyed by a collection name (table, bucket, ...).
/// Implemented by the infrastructure layer (quarry-store).
pub trait DataSource {
    /// Insert a row; on success [`DataSource::generated_id`] reports the
    /// identifier the backend generated, if any
    fn create(&mut self, collection: &str, row: Row) -> Result<bool, DataSourceError>;

    /// Read rows matching the query, projected to `options.fields`
    fn read(&self, collection: &str, query: &QueryObject) -> Result<Vec<Row>, DataSourceError>;

    /// Merge `row` into every match, returning the number of rows affected
    fn update(
        &mut self,
        collection: &str,
        query: &QueryObject,
        row: Row,
    ) -> Result<usize, DataSourceError>;

    /// Remove every match, returning the number of rows removed
    fn delete(&mut self, collection: &str, query: &QueryObject) -> Result<usize, DataSourceError>;

    /// Count the rows `read` would return
    fn count(&self, collection: &str, query: &QueryObject) -> Result<usize, DataSourceError>;

    /// Identifier generated by the most recent create, if any
    fn generated_id(&self) -> Option<Value>;
}

/// A data source shared by every mapper of a registry
///
/// Mappers are single-threaded: each call borrows the source only for the
/// duration of one storage operation.
pub type SharedDataSource = Rc<RefCell<dyn DataSource>>;

/// Wrap a data source for sharing between mappers
pub fn shared<D: DataSource + 'static>(data_source: D) -> SharedDataSource {
    Rc::new(RefCell::new(data_source))
}

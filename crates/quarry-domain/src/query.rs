//! Query objects: criteria plus options describing a data source lookup
//!
//! A [`QueryObject`] performs no validation; each consumer decides what it
//! understands. Condition keys are parsed by [`crate::condition`].

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered condition-key to value mapping, combined with logical AND
///
/// A condition key is a field name optionally followed by a space and an
/// operator token, e.g. `"id !="` or `"title LIKE"`.
///
/// # Examples
///
/// ```
/// use quarry_domain::Criteria;
///
/// let criteria = Criteria::new().and("author_id", 2000).and("id !=", 1000);
/// assert_eq!(criteria.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(IndexMap<String, Value>);

impl Criteria {
    /// Create empty criteria (matches every row)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, builder style
    pub fn and(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a condition
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get the value for a condition key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Merge another set of conditions into this one; later keys win
    pub fn extend(&mut self, other: Criteria) {
        self.0.extend(other.0);
    }

    /// Iterate over conditions in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of conditions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no conditions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Criteria {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for Criteria {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl Direction {
    /// Parse `ASC`/`DESC`, case-insensitively; anything else is ascending
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort specification: field to direction, first entry is the primary key
pub type Order = IndexMap<String, Direction>;

/// Named options of a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Maximum number of rows, `None` is unbounded
    #[serde(default)]
    pub limit: Option<usize>,

    /// Number of matching rows to skip
    #[serde(default)]
    pub offset: usize,

    /// Sort order
    #[serde(default)]
    pub order: Order,

    /// Projection; empty means every field
    #[serde(default)]
    pub fields: Vec<String>,

    /// Association property names to eager-load
    #[serde(default)]
    pub with: Vec<String>,

    /// Reserved for grouping; carried but not interpreted
    #[serde(default)]
    pub group: Vec<String>,
}

impl QueryOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Append a sort key
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.insert(field.into(), direction);
        self
    }

    /// Set the projection
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the associations to eager-load
    pub fn with<I, S>(mut self, with: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with = with.into_iter().map(Into::into).collect();
        self
    }

    /// Set the group fields
    pub fn group<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group = group.into_iter().map(Into::into).collect();
        self
    }

    /// Read a single option by name
    pub fn get(&self, name: OptionName) -> QueryOption {
        match name {
            OptionName::Limit => QueryOption::Limit(self.limit),
            OptionName::Offset => QueryOption::Offset(self.offset),
            OptionName::Order => QueryOption::Order(self.order.clone()),
            OptionName::Fields => QueryOption::Fields(self.fields.clone()),
            OptionName::With => QueryOption::With(self.with.clone()),
            OptionName::Group => QueryOption::Group(self.group.clone()),
        }
    }

    /// Replace a single option
    pub fn set(&mut self, option: QueryOption) {
        match option {
            QueryOption::Limit(limit) => self.limit = limit,
            QueryOption::Offset(offset) => self.offset = offset,
            QueryOption::Order(order) => self.order = order,
            QueryOption::Fields(fields) => self.fields = fields,
            QueryOption::With(with) => self.with = with,
            QueryOption::Group(group) => self.group = group,
        }
    }
}

/// Names of the individual query options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionName {
    /// `limit`
    Limit,
    /// `offset`
    Offset,
    /// `order`
    Order,
    /// `fields`
    Fields,
    /// `with`
    With,
    /// `group`
    Group,
}

/// A single option together with its value
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOption {
    /// Maximum number of rows
    Limit(Option<usize>),
    /// Rows to skip
    Offset(usize),
    /// Sort order
    Order(Order),
    /// Projection
    Fields(Vec<String>),
    /// Associations to eager-load
    With(Vec<String>),
    /// Group fields
    Group(Vec<String>),
}

/// Criteria and options describing a lookup
///
/// Cheap to clone; mappers derive copies (for example with `limit = 1`)
/// instead of mutating a query the caller still holds.
///
/// # Examples
///
/// ```
/// use quarry_domain::{Criteria, QueryObject, QueryOption, QueryOptions, OptionName};
///
/// let mut query = QueryObject::new(Criteria::new().and("id", 1000), QueryOptions::new());
/// query.set_option(QueryOption::Limit(Some(1)));
/// assert_eq!(query.option(OptionName::Limit), QueryOption::Limit(Some(1)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryObject {
    #[serde(default)]
    criteria: Criteria,
    #[serde(default)]
    options: QueryOptions,
}

impl QueryObject {
    /// Create a query from criteria and options
    pub fn new(criteria: Criteria, options: QueryOptions) -> Self {
        Self { criteria, options }
    }

    /// Create a query with criteria only
    pub fn with_criteria(criteria: Criteria) -> Self {
        Self::new(criteria, QueryOptions::default())
    }

    /// Get the criteria
    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// Replace the criteria
    pub fn set_criteria(&mut self, criteria: Criteria) -> &mut Self {
        self.criteria = criteria;
        self
    }

    /// Get the options
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Mutable access to the options
    pub fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }

    /// Replace all options
    pub fn set_options(&mut self, options: QueryOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Read a single option
    pub fn option(&self, name: OptionName) -> QueryOption {
        self.options.get(name)
    }

    /// Replace a single option
    pub fn set_option(&mut self, option: QueryOption) -> &mut Self {
        self.options.set(option);
        self
    }

    /// Split into criteria and options
    pub fn into_parts(self) -> (Criteria, QueryOptions) {
        (self.criteria, self.options)
    }
}

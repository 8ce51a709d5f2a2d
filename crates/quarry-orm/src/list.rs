//! Key/value lists built from raw rows by `find_list`

use indexmap::IndexMap;
use quarry_domain::{Row, Value};

/// Which row fields a list is built from
///
/// Without `key_field` the mapper's single primary key is used. A
/// `group_field` only takes effect together with a `value_field`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFields {
    /// Field used as key (or as the value of a plain list)
    pub key_field: Option<String>,
    /// Field used as value
    pub value_field: Option<String>,
    /// Field the key/value pairs are grouped under
    pub group_field: Option<String>,
}

impl ListFields {
    /// Default fields: primary key only
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key field
    pub fn key(mut self, field: impl Into<String>) -> Self {
        self.key_field = Some(field.into());
        self
    }

    /// Set the value field
    pub fn value(mut self, field: impl Into<String>) -> Self {
        self.value_field = Some(field.into());
        self
    }

    /// Set the group field
    pub fn group(mut self, field: impl Into<String>) -> Self {
        self.group_field = Some(field.into());
        self
    }
}

/// Result of `find_list`
///
/// Maps keep first-insertion order; a later duplicate key overwrites the
/// earlier value in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldList {
    /// Key field of every row
    Values(Vec<Value>),
    /// Key to value
    Map(IndexMap<Value, Value>),
    /// Group to (key to value)
    Grouped(IndexMap<Value, IndexMap<Value, Value>>),
}

fn field(row: &Row, name: &str) -> Value {
    row.get(name).cloned().unwrap_or(Value::Null)
}

impl FieldList {
    pub(crate) fn from_rows(
        rows: &[Row],
        key_field: &str,
        value_field: Option<&str>,
        group_field: Option<&str>,
    ) -> Self {
        match (value_field, group_field) {
            (Some(value_field), Some(group_field)) => {
                let mut grouped: IndexMap<Value, IndexMap<Value, Value>> = IndexMap::new();
                for row in rows {
                    grouped
                        .entry(field(row, group_field))
                        .or_default()
                        .insert(field(row, key_field), field(row, value_field));
                }
                FieldList::Grouped(grouped)
            }
            (Some(value_field), None) => FieldList::Map(
                rows.iter()
                    .map(|row| (field(row, key_field), field(row, value_field)))
                    .collect(),
            ),
            (None, _) => FieldList::Values(rows.iter().map(|row| field(row, key_field)).collect()),
        }
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        match self {
            FieldList::Values(values) => values.len(),
            FieldList::Map(map) => map.len(),
            FieldList::Grouped(groups) => groups.len(),
        }
    }

    /// True when the list has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

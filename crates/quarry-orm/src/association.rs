//! Association definitions
//!
//! An association names a property of the owning entity, the entity type on
//! the other side and the keys that connect them. Target mappers are resolved
//! through the [`MapperManager`] when the association is used, never when it
//! is declared, so mappers may reference each other freely.

use crate::manager::MapperManager;
use crate::relational::Mapped;
use crate::MapperError;
use quarry_domain::{Criteria, Direction, Order, Related, Value};
use std::fmt;
use std::rc::Rc;

/// The four relationship kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// This entity holds the foreign key
    BelongsTo,
    /// Exactly one related row references this entity
    HasOne,
    /// Many related rows reference this entity
    HasMany,
    /// Many-to-many through a join table
    BelongsToMany,
}

impl AssociationKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::BelongsTo => "belongsTo",
            AssociationKind::HasOne => "hasOne",
            AssociationKind::HasMany => "hasMany",
            AssociationKind::BelongsToMany => "belongsToMany",
        }
    }

    /// Whether the property holds one entity or a collection
    pub fn cardinality(&self) -> Cardinality {
        match self {
            AssociationKind::BelongsTo | AssociationKind::HasOne => Cardinality::One,
            AssociationKind::HasMany | AssociationKind::BelongsToMany => Cardinality::Many,
        }
    }

    /// Position in which associations are resolved
    pub(crate) fn rank(&self) -> u8 {
        match self {
            AssociationKind::BelongsTo => 0,
            AssociationKind::HasMany => 1,
            AssociationKind::HasOne => 2,
            AssociationKind::BelongsToMany => 3,
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of an association property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Zero or one related entity
    One,
    /// A possibly empty collection
    Many,
}

impl Cardinality {
    pub(crate) fn empty(&self) -> Related {
        match self {
            Cardinality::One => Related::One(None),
            Cardinality::Many => Related::Many(Vec::new()),
        }
    }
}

type Resolver = fn(&MapperManager) -> Result<Rc<dyn RelatedMapper>, MapperError>;

/// Target entity type of an association
#[derive(Clone, Copy)]
pub(crate) struct Target {
    pub(crate) name: &'static str,
    pub(crate) resolve: Resolver,
}

fn resolve<T: Mapped>(manager: &MapperManager) -> Result<Rc<dyn RelatedMapper>, MapperError> {
    let mapper = manager.get::<T>()?;
    Ok(mapper)
}

/// Type-erased view of a mapper used from the other side of an association
pub trait RelatedMapper {
    /// Upcast for downcasting to the concrete mapper type
    fn into_any(self: Rc<Self>) -> Rc<dyn std::any::Any>;

    /// Collection name in the data source
    fn table_name(&self) -> &str;

    /// First primary key field
    fn binding_key(&self) -> Result<String, MapperError>;

    /// Read related entities in one pass and distribute them
    ///
    /// `groups` holds, per parent, the values of `match_field` that parent
    /// relates to. The read applies the association's conditions, fields and
    /// order plus `match_field IN (all values)`. One [`Related`] is returned
    /// per group, in order.
    fn load_related(
        &self,
        association: &Association,
        match_field: &str,
        groups: &[Vec<Value>],
    ) -> Result<Vec<Related>, MapperError>;

    /// Find every match and delete it through this mapper's own delete
    fn delete_related(&self, criteria: Criteria) -> Result<usize, MapperError>;
}

/// Definition of one association
///
/// # Examples
///
/// ```ignore
/// Association::has_many("comments")
///     .class::<Comment>()
///     .foreign_key("article_id")
///     .dependent(true)
///     .order("created", Direction::Desc);
/// ```
#[derive(Clone)]
pub struct Association {
    pub(crate) kind: AssociationKind,
    pub(crate) property_name: String,
    pub(crate) target: Option<Target>,
    pub(crate) foreign_key: Option<String>,
    pub(crate) join_table: Option<String>,
    pub(crate) other_foreign_key: Option<String>,
    pub(crate) dependent: bool,
    pub(crate) conditions: Criteria,
    pub(crate) fields: Vec<String>,
    pub(crate) order: Order,
}

impl Association {
    fn new(kind: AssociationKind, property_name: impl Into<String>) -> Self {
        Self {
            kind,
            property_name: property_name.into(),
            target: None,
            foreign_key: None,
            join_table: None,
            other_foreign_key: None,
            dependent: false,
            conditions: Criteria::new(),
            fields: Vec::new(),
            order: Order::new(),
        }
    }

    /// This entity holds `foreign_key`, pointing at the target's primary key
    pub fn belongs_to(property_name: impl Into<String>) -> Self {
        Self::new(AssociationKind::BelongsTo, property_name)
    }

    /// The target holds `foreign_key`, pointing at this entity; at most one
    pub fn has_one(property_name: impl Into<String>) -> Self {
        Self::new(AssociationKind::HasOne, property_name)
    }

    /// The target holds `foreign_key`, pointing at this entity
    pub fn has_many(property_name: impl Into<String>) -> Self {
        Self::new(AssociationKind::HasMany, property_name)
    }

    /// Rows of `join_table` pair `foreign_key` (this entity) with
    /// `other_foreign_key` (the target)
    pub fn belongs_to_many(property_name: impl Into<String>) -> Self {
        Self::new(AssociationKind::BelongsToMany, property_name)
    }

    /// Entity type on the other side
    pub fn class<T: Mapped>(mut self) -> Self {
        self.target = Some(Target {
            name: std::any::type_name::<T>(),
            resolve: resolve::<T>,
        });
        self
    }

    /// Set the foreign key
    pub fn foreign_key(mut self, field: impl Into<String>) -> Self {
        self.foreign_key = Some(field.into());
        self
    }

    /// Set the join table (belongsToMany)
    pub fn join_table(mut self, table: impl Into<String>) -> Self {
        self.join_table = Some(table.into());
        self
    }

    /// Set the join table column pointing at the target (belongsToMany)
    pub fn other_foreign_key(mut self, field: impl Into<String>) -> Self {
        self.other_foreign_key = Some(field.into());
        self
    }

    /// Delete related rows when the owner is deleted; ignored for belongsTo
    pub fn dependent(mut self, dependent: bool) -> Self {
        self.dependent = dependent;
        self
    }

    /// Extra criteria applied to the related read
    pub fn conditions(mut self, conditions: Criteria) -> Self {
        self.conditions = conditions;
        self
    }

    /// Projection of the related read
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Add a sort field to the related read
    pub fn order(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.insert(field.into(), direction);
        self
    }

    /// Relationship kind
    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    /// Property the related entities are assigned to
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// Whether deletes cascade through this association
    pub fn is_dependent(&self) -> bool {
        self.dependent && self.kind != AssociationKind::BelongsTo
    }

    /// Check that every key the kind requires is present
    pub fn validate(&self) -> Result<(), MapperError> {
        let kind = self.kind;
        let missing = |what: &str| {
            MapperError::Configuration(format!(
                "{} `{}` is missing {}",
                kind, self.property_name, what
            ))
        };

        if self.property_name.trim().is_empty() {
            return Err(MapperError::Configuration(format!(
                "{} is missing propertyName",
                kind
            )));
        }
        if is_blank(&self.foreign_key) {
            return Err(missing("foreignKey"));
        }
        if self.target.is_none() {
            return Err(missing("class"));
        }
        if kind == AssociationKind::BelongsToMany {
            if is_blank(&self.join_table) {
                return Err(missing("joinTable"));
            }
            if is_blank(&self.other_foreign_key) {
                return Err(missing("otherForeignKey"));
            }
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, manager: &MapperManager) -> Result<Rc<dyn RelatedMapper>, MapperError> {
        let target = self.target.ok_or_else(|| {
            MapperError::Configuration(format!("{} `{}` is missing class", self.kind, self.property_name))
        })?;
        (target.resolve)(manager)
    }

    pub(crate) fn foreign_key_field(&self) -> &str {
        self.foreign_key.as_deref().unwrap_or_default()
    }

    pub(crate) fn join_table_name(&self) -> &str {
        self.join_table.as_deref().unwrap_or_default()
    }

    pub(crate) fn other_foreign_key_field(&self) -> &str {
        self.other_foreign_key.as_deref().unwrap_or_default()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("kind", &self.kind)
            .field("property_name", &self.property_name)
            .field("class", &self.target.map(|t| t.name))
            .field("foreign_key", &self.foreign_key)
            .field("join_table", &self.join_table)
            .field("other_foreign_key", &self.other_foreign_key)
            .field("dependent", &self.dependent)
            .field("conditions", &self.conditions)
            .field("fields", &self.fields)
            .field("order", &self.order)
            .finish()
    }
}

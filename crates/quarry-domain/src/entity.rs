//! Entity contract: structured field access plus a stable identity handle

use crate::error::EntityError;
use crate::value::Value;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// Stable identity of an entity value, based on UUIDv7
///
/// Mappers track persisted state by handle instead of by memory address, so
/// moving an entity around does not lose that state. Clones share the handle
/// and therefore count as the same entity value. The identity stays alive
/// until the last clone is dropped; mappers only hold a [`WeakEntityHandle`].
#[derive(Clone)]
pub struct EntityHandle(Rc<u128>);

impl EntityHandle {
    /// Generate a fresh handle
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_domain::EntityHandle;
    ///
    /// assert_ne!(EntityHandle::new(), EntityHandle::new());
    /// ```
    pub fn new() -> Self {
        Self(Rc::new(uuid::Uuid::now_v7().as_u128()))
    }

    /// Create a handle from a raw value
    pub fn from_value(value: u128) -> Self {
        Self(Rc::new(value))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        *self.0
    }

    /// Non-owning reference to this handle
    pub fn downgrade(&self) -> WeakEntityHandle {
        WeakEntityHandle(Rc::downgrade(&self.0))
    }
}

impl Default for EntityHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl Eq for EntityHandle {}

impl PartialOrd for EntityHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value().cmp(&other.value())
    }
}

impl Hash for EntityHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value().hash(state);
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityHandle").field(&self.to_string()).finish()
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.value()))
    }
}

/// Handle reference that does not keep the entity identity alive
#[derive(Debug, Clone)]
pub struct WeakEntityHandle(Weak<u128>);

impl WeakEntityHandle {
    /// True while at least one clone of the entity still exists
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// A mapped domain record
///
/// Implementors expose their fields by name so mappers never need to look
/// inside private state. `field` returns `None` for a field that has no value
/// yet; such fields are left out of storage rows rather than written as
/// defaults.
///
/// # Examples
///
/// ```
/// use quarry_domain::{Entity, EntityError, EntityHandle, Value};
///
/// #[derive(Debug, Clone, Default)]
/// struct Tag {
///     handle: EntityHandle,
///     id: Option<i64>,
///     name: Option<String>,
/// }
///
/// impl Entity for Tag {
///     fn handle(&self) -> &EntityHandle {
///         &self.handle
///     }
///
///     fn field(&self, name: &str) -> Option<Value> {
///         match name {
///             "id" => self.id.map(Value::from),
///             "name" => self.name.clone().map(Value::from),
///             _ => None,
///         }
///     }
///
///     fn set_field(&mut self, name: &str, value: Value) -> Result<(), EntityError> {
///         match name {
///             "id" => self.id = value.into_typed().map_err(|e| EntityError::invalid_value(name, e))?,
///             "name" => self.name = value.into_typed().map_err(|e| EntityError::invalid_value(name, e))?,
///             _ => return Err(EntityError::UnknownField(name.to_string())),
///         }
///         Ok(())
///     }
/// }
///
/// let mut tag = Tag::default();
/// tag.set_field("name", Value::from("rust")).unwrap();
/// assert_eq!(tag.field("name"), Some(Value::from("rust")));
/// assert_eq!(tag.field("id"), None);
/// ```
pub trait Entity: Default + Clone + 'static {
    /// Stable identity of this value
    fn handle(&self) -> &EntityHandle;

    /// Read a field by name; `None` when uninitialized or unknown
    fn field(&self, name: &str) -> Option<Value>;

    /// Write a field by name
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), EntityError>;

    /// Assign eager-loaded related entities to an association property
    fn set_related(&mut self, property: &str, related: Related) -> Result<(), EntityError> {
        let _ = related;
        Err(EntityError::UnknownProperty(property.to_string()))
    }
}

/// Type-erased related entities produced by eager loading
///
/// The mapper that loaded them knows their concrete type; the receiving
/// entity recovers it with [`Related::into_one`] or [`Related::into_many`].
pub enum Related {
    /// Result of a belongs-to or has-one association
    One(Option<Box<dyn Any>>),
    /// Result of a has-many or belongs-to-many association
    Many(Vec<Box<dyn Any>>),
}

impl Related {
    /// Recover a single related entity
    ///
    /// A `Many` result yields its first element.
    pub fn into_one<T: 'static>(self, property: &str) -> Result<Option<T>, EntityError> {
        let boxed = match self {
            Related::One(boxed) => boxed,
            Related::Many(list) => list.into_iter().next(),
        };

        boxed
            .map(|b| {
                b.downcast::<T>()
                    .map(|t| *t)
                    .map_err(|_| EntityError::RelatedType(property.to_string()))
            })
            .transpose()
    }

    /// Recover a collection of related entities
    ///
    /// A `One` result yields zero or one elements.
    pub fn into_many<T: 'static>(self, property: &str) -> Result<Vec<T>, EntityError> {
        let list = match self {
            Related::One(boxed) => boxed.into_iter().collect(),
            Related::Many(list) => list,
        };

        list.into_iter()
            .map(|b| {
                b.downcast::<T>()
                    .map(|t| *t)
                    .map_err(|_| EntityError::RelatedType(property.to_string()))
            })
            .collect()
    }

    /// Number of related entities carried
    pub fn len(&self) -> usize {
        match self {
            Related::One(boxed) => usize::from(boxed.is_some()),
            Related::Many(list) => list.len(),
        }
    }

    /// True when nothing is carried
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Related::One(boxed) => write!(f, "Related::One({})", usize::from(boxed.is_some())),
            Related::Many(list) => write!(f, "Related::Many({})", list.len()),
        }
    }
}

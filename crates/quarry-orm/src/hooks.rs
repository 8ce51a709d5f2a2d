//! Lifecycle hooks
//!
//! Each event holds an ordered list of callbacks. `before_*` callbacks run in
//! registration order and the first one returning `false` vetoes the
//! operation; the remaining callbacks are skipped. `after_*` callbacks always
//! all run and cannot veto.

use quarry_domain::{QueryObject, Row};
use std::fmt;

type Veto<T> = Box<dyn Fn(&mut T) -> bool>;
type Check<T> = Box<dyn Fn(&T) -> bool>;
type Notify<T> = Box<dyn Fn(&T)>;
type AfterFind = Box<dyn Fn(&mut [Row], &QueryObject)>;

/// Callbacks attached to a mapper's lifecycle events
///
/// # Examples
///
/// ```
/// use quarry_orm::Hooks;
///
/// #[derive(Default)]
/// struct Post { title: String }
///
/// let mut hooks: Hooks<Post> = Hooks::new();
/// hooks
///     .before_save(|post| !post.title.is_empty())
///     .after_save(|post| println!("saved {}", post.title));
/// assert_eq!(hooks.len(), 2);
/// ```
pub struct Hooks<E> {
    before_save: Vec<Veto<E>>,
    after_save: Vec<Notify<E>>,
    before_create: Vec<Veto<E>>,
    after_create: Vec<Notify<E>>,
    before_update: Vec<Veto<E>>,
    after_update: Vec<Notify<E>>,
    before_delete: Vec<Check<E>>,
    after_delete: Vec<Notify<E>>,
    before_find: Vec<Veto<QueryObject>>,
    after_find: Vec<AfterFind>,
}

impl<E> Hooks<E> {
    /// Create an empty hook set
    pub fn new() -> Self {
        Self {
            before_save: Vec::new(),
            after_save: Vec::new(),
            before_create: Vec::new(),
            after_create: Vec::new(),
            before_update: Vec::new(),
            after_update: Vec::new(),
            before_delete: Vec::new(),
            after_delete: Vec::new(),
            before_find: Vec::new(),
            after_find: Vec::new(),
        }
    }

    /// Run before create or update; may modify the entity
    pub fn before_save(&mut self, hook: impl Fn(&mut E) -> bool + 'static) -> &mut Self {
        self.before_save.push(Box::new(hook));
        self
    }

    /// Run after a successful save
    pub fn after_save(&mut self, hook: impl Fn(&E) + 'static) -> &mut Self {
        self.after_save.push(Box::new(hook));
        self
    }

    /// Run before a new entity is written
    pub fn before_create(&mut self, hook: impl Fn(&mut E) -> bool + 'static) -> &mut Self {
        self.before_create.push(Box::new(hook));
        self
    }

    /// Run after a successful create, once a generated id has been assigned
    pub fn after_create(&mut self, hook: impl Fn(&E) + 'static) -> &mut Self {
        self.after_create.push(Box::new(hook));
        self
    }

    /// Run before a persisted entity is written
    pub fn before_update(&mut self, hook: impl Fn(&mut E) -> bool + 'static) -> &mut Self {
        self.before_update.push(Box::new(hook));
        self
    }

    /// Run after a successful update
    pub fn after_update(&mut self, hook: impl Fn(&E) + 'static) -> &mut Self {
        self.after_update.push(Box::new(hook));
        self
    }

    /// Run before an entity is deleted
    pub fn before_delete(&mut self, hook: impl Fn(&E) -> bool + 'static) -> &mut Self {
        self.before_delete.push(Box::new(hook));
        self
    }

    /// Run after a successful delete
    pub fn after_delete(&mut self, hook: impl Fn(&E) + 'static) -> &mut Self {
        self.after_delete.push(Box::new(hook));
        self
    }

    /// Run before every read, including counts; may rewrite the query
    pub fn before_find(&mut self, hook: impl Fn(&mut QueryObject) -> bool + 'static) -> &mut Self {
        self.before_find.push(Box::new(hook));
        self
    }

    /// Run on the raw rows of a non-empty read, before they are mapped
    pub fn after_find(&mut self, hook: impl Fn(&mut [Row], &QueryObject) + 'static) -> &mut Self {
        self.after_find.push(Box::new(hook));
        self
    }

    /// Total number of registered callbacks
    pub fn len(&self) -> usize {
        self.before_save.len()
            + self.after_save.len()
            + self.before_create.len()
            + self.after_create.len()
            + self.before_update.len()
            + self.after_update.len()
            + self.before_delete.len()
            + self.after_delete.len()
            + self.before_find.len()
            + self.after_find.len()
    }

    /// True when no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn run_before_save(&self, entity: &mut E) -> bool {
        self.before_save.iter().all(|hook| hook(entity))
    }

    pub(crate) fn run_after_save(&self, entity: &E) {
        self.after_save.iter().for_each(|hook| hook(entity));
    }

    pub(crate) fn run_before_create(&self, entity: &mut E) -> bool {
        self.before_create.iter().all(|hook| hook(entity))
    }

    pub(crate) fn run_after_create(&self, entity: &E) {
        self.after_create.iter().for_each(|hook| hook(entity));
    }

    pub(crate) fn run_before_update(&self, entity: &mut E) -> bool {
        self.before_update.iter().all(|hook| hook(entity))
    }

    pub(crate) fn run_after_update(&self, entity: &E) {
        self.after_update.iter().for_each(|hook| hook(entity));
    }

    pub(crate) fn run_before_delete(&self, entity: &E) -> bool {
        self.before_delete.iter().all(|hook| hook(entity))
    }

    pub(crate) fn run_after_delete(&self, entity: &E) {
        self.after_delete.iter().for_each(|hook| hook(entity));
    }

    pub(crate) fn run_before_find(&self, query: &mut QueryObject) -> bool {
        self.before_find.iter().all(|hook| hook(query))
    }

    pub(crate) fn run_after_find(&self, rows: &mut [Row], query: &QueryObject) {
        for hook in &self.after_find {
            hook(rows, query);
        }
    }
}

impl<E> Default for Hooks<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Hooks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").field("callbacks", &self.len()).finish()
    }
}

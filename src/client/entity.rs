//! Caller-side objects that rows are hydrated into.
//!
//! The worker only ever returns primitive rows. The `Class` and `Into`
//! fetch modes are rebuilt here: an associative row is fetched remotely and
//! its columns are written onto a local [`Entity`].

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::value::{Record, Value};

/// A type that result rows can be written onto.
pub trait Entity: AsAny + Send + fmt::Debug + 'static {
    /// Store one column. Called once per column, in column order.
    fn set_field(&mut self, name: &str, value: Value);

    /// Runs after every field has been set.
    fn construct(&mut self, _args: &[Value]) {}
}

/// Downcasting support for [`Entity`] trait objects.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn Entity {
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// An existing instance populated by the `Into` fetch mode.
///
/// The caller keeps a clone; fetches write into the same allocation.
pub type SharedEntity = Arc<Mutex<dyn Entity>>;

/// Wrap an instance for the `Into` fetch mode.
pub fn shared<T: Entity>(entity: T) -> SharedEntity {
    Arc::new(Mutex::new(entity))
}

/// Makes blank instances of one entity type.
///
/// A blank instance is what fields are written onto before
/// [`Entity::construct`] runs.
#[derive(Clone)]
pub struct EntityClass {
    name: &'static str,
    blank: Arc<dyn Fn() -> Box<dyn Entity> + Send + Sync>,
}

impl EntityClass {
    pub fn new<F>(name: &'static str, blank: F) -> Self
    where
        F: Fn() -> Box<dyn Entity> + Send + Sync + 'static,
    {
        Self {
            name,
            blank: Arc::new(blank),
        }
    }

    /// Blank instances come from `T::default()`.
    pub fn of<T: Entity + Default>() -> Self {
        Self::new(any::type_name::<T>(), || Box::new(T::default()))
    }

    pub fn std_object() -> Self {
        Self::of::<StdObject>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn instantiate(&self) -> Box<dyn Entity> {
        (self.blank)()
    }
}

impl fmt::Debug for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityClass").field(&self.name).finish()
    }
}

/// A property bag; the default target of `fetch_object`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StdObject {
    fields: Record,
}

impl StdObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Record {
        &self.fields
    }

    pub fn into_record(self) -> Record {
        self.fields
    }
}

impl Entity for StdObject {
    fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name, value);
    }
}

/// Write a fetched row onto `entity`: every column first, then the
/// constructor.
pub(crate) fn hydrate(entity: &mut dyn Entity, row: Record, ctor_args: Option<&[Value]>) {
    for (key, value) in row {
        entity.set_field(&key.to_string(), value);
    }
    if let Some(args) = ctor_args {
        entity.construct(args);
    }
}

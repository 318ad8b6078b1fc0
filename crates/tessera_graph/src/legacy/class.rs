use super::stream::{ObjectInput, ObjectOutput};
use crate::object::{ObjectRef, Value};
use std::any::Any;
use std::error::Error;
use std::sync::Arc;

/// Result of a serialization hook. Any error can be raised with `?`.
pub type HookResult<T = ()> = Result<T, Box<dyn Error + Send + Sync>>;

/// A per-level `writeObject` hook.
pub type WriteObjectHook<T> = fn(&T, &mut ObjectOutput<'_>) -> HookResult;

/// A per-level `readObject` hook.
pub type ReadObjectHook<T> = fn(&T, &mut ObjectInput<'_>) -> HookResult;

/// Accessors for one serializable field.
///
/// Objects are shared once decoded, so setters work through interior
/// mutability.
pub struct FieldAccess<T> {
    /// Field name, used in property traces.
    pub name: &'static str,
    /// Reads the field.
    pub get: fn(&T) -> Value,
    /// Writes the field on a blank instance.
    pub set: fn(&T, Value) -> HookResult,
}

/// One level of a class hierarchy.
pub struct ClassLevel<T> {
    /// Name of the class declaring this level.
    pub name: &'static str,
    /// Default-serialized fields, in declaration order. Transient fields
    /// are not listed.
    pub fields: Vec<FieldAccess<T>>,
    /// Replaces default field writing for this level.
    pub write_object: Option<WriteObjectHook<T>>,
    /// Replaces default field reading for this level.
    pub read_object: Option<ReadObjectHook<T>>,
}

impl<T> ClassLevel<T> {
    /// Creates a level without fields or hooks.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            write_object: None,
            read_object: None,
        }
    }

    /// Adds a default-serialized field.
    pub fn field(
        mut self,
        name: &'static str,
        get: fn(&T) -> Value,
        set: fn(&T, Value) -> HookResult,
    ) -> Self {
        self.fields.push(FieldAccess { name, get, set });
        self
    }

    /// Sets the `writeObject` hook.
    pub fn with_write_object(mut self, hook: WriteObjectHook<T>) -> Self {
        self.write_object = Some(hook);
        self
    }

    /// Sets the `readObject` hook.
    pub fn with_read_object(mut self, hook: ReadObjectHook<T>) -> Self {
        self.read_object = Some(hook);
        self
    }
}

/// Optional `writeReplace` and `readResolve` hooks.
pub struct ReplaceHooks<T> {
    /// Returns the object to write instead, or `None` to write `self`.
    pub write_replace: Option<fn(&Arc<T>) -> HookResult<Option<ObjectRef>>>,
    /// Returns the object to hand out instead of the decoded one.
    pub read_resolve: Option<fn(Arc<T>) -> HookResult<ObjectRef>>,
}

impl<T> Default for ReplaceHooks<T> {
    fn default() -> Self {
        Self {
            write_replace: None,
            read_resolve: None,
        }
    }
}

/// A class serialized field by field, one [`ClassLevel`] at a time.
pub trait Serializable: Any + Send + Sync + Sized {
    /// Name written to the stream and used to find the class when decoding.
    const CLASS_NAME: &'static str;

    /// Creates the instance that decoding fills in.
    fn blank() -> Self;

    /// Returns the class chain, superclass first.
    fn class_levels() -> Vec<ClassLevel<Self>>;

    /// Returns the replace and resolve hooks.
    fn replace_hooks() -> ReplaceHooks<Self> {
        ReplaceHooks::default()
    }
}

/// A class that writes and reads its whole state itself.
pub trait Externalizable: Any + Send + Sync + Sized {
    /// Name written to the stream and used to find the class when decoding.
    const CLASS_NAME: &'static str;

    /// Creates the instance that decoding fills in.
    fn blank() -> Self;

    /// Writes the state of `self`.
    fn write_external(&self, out: &mut ObjectOutput<'_>) -> HookResult;

    /// Reads state into a blank instance.
    fn read_external(&self, input: &mut ObjectInput<'_>) -> HookResult;

    /// Returns the replace and resolve hooks.
    fn replace_hooks() -> ReplaceHooks<Self> {
        ReplaceHooks::default()
    }
}

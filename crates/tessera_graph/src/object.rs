//! Dynamically typed graph values.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Any value that can live in an encoded graph.
///
/// Implemented for every `Any + Send + Sync` type. Prefer the free functions
/// in this module over calling these methods on an [`ObjectRef`] directly:
/// method syntax on an `Arc<dyn GraphObject>` picks the implementation for
/// the `Arc` itself.
pub trait GraphObject: Any + Send + Sync {
    /// Returns the runtime type name of the value.
    fn type_name(&self) -> &'static str;

    /// Returns the value as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Converts a shared reference into a shared `Any`.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> GraphObject for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for dyn GraphObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", GraphObject::type_name(self))
    }
}

/// A shared reference to a graph object. Identity is pointer identity.
pub type ObjectRef = Arc<dyn GraphObject>;

/// A nullable graph value.
pub type Value = Option<ObjectRef>;

/// Wraps a value into an [`ObjectRef`].
pub fn object<T: Any + Send + Sync>(value: T) -> ObjectRef {
    Arc::new(value)
}

/// Wraps a value into a non-null [`Value`].
pub fn value<T: Any + Send + Sync>(value: T) -> Value {
    Some(Arc::new(value))
}

/// Returns the runtime type name of the referenced object.
pub fn type_name_of(obj: &ObjectRef) -> &'static str {
    GraphObject::type_name(&**obj)
}

/// Returns the runtime type id of the referenced object.
pub fn type_id_of(obj: &ObjectRef) -> TypeId {
    Any::type_id(GraphObject::as_any(&**obj))
}

/// Returns the address used as the identity of the referenced object.
pub fn identity_of(obj: &ObjectRef) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

/// Returns `true` if both references point at the same object.
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    identity_of(a) == identity_of(b)
}

/// Downcasts a shared reference to a concrete type.
pub fn downcast<T: Any + Send + Sync>(obj: &ObjectRef) -> Option<Arc<T>> {
    GraphObject::into_any_arc(Arc::clone(obj)).downcast::<T>().ok()
}

/// Borrows the referenced object as a concrete type.
pub fn downcast_ref<T: Any>(obj: &ObjectRef) -> Option<&T> {
    GraphObject::as_any(&**obj).downcast_ref::<T>()
}

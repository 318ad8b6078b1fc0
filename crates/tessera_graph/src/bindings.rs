//! Ordered type-to-codec bindings.

use crate::codec::{Codec, TypedCodec};
use crate::object::{type_id_of, GraphObject, ObjectRef};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

type Predicate = Box<dyn Fn(&ObjectRef) -> bool + Send + Sync>;

enum Matcher {
    Exact(TypeId),
    Predicate(Predicate),
}

/// A codec together with the values it applies to.
pub struct Binding {
    tag: u32,
    description: String,
    matcher: Matcher,
    codec: Arc<dyn Codec<ObjectRef>>,
}

impl Binding {
    /// Returns the tag written before values encoded by this binding.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Returns a human-readable description of the bound values.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the codec.
    pub fn codec(&self) -> &Arc<dyn Codec<ObjectRef>> {
        &self.codec
    }

    fn matches(&self, obj: &ObjectRef) -> bool {
        match &self.matcher {
            Matcher::Exact(type_id) => type_id_of(obj) == *type_id,
            Matcher::Predicate(predicate) => predicate(obj),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("tag", &self.tag)
            .field("description", &self.description)
            .finish()
    }
}

/// An ordered list of bindings. The first binding matching a value wins.
///
/// Tags are positional, so a stream can only be decoded with the same list
/// it was encoded with. Tag `0` is reserved for null.
#[derive(Debug)]
pub struct Bindings {
    bindings: Vec<Binding>,
}

impl Bindings {
    /// Starts an empty binding list.
    pub fn builder() -> BindingsBuilder {
        BindingsBuilder::default()
    }

    /// Finds the first binding matching `obj`.
    pub fn find(&self, obj: &ObjectRef) -> Option<&Binding> {
        self.bindings.iter().find(|binding| binding.matches(obj))
    }

    /// Returns the binding written with `tag`.
    pub fn by_tag(&self, tag: u32) -> Option<&Binding> {
        let index = tag.checked_sub(1)? as usize;
        self.bindings.get(index)
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Collects bindings in priority order.
#[derive(Default)]
pub struct BindingsBuilder {
    bindings: Vec<Binding>,
}

impl BindingsBuilder {
    /// Binds values whose runtime type is exactly `T`.
    pub fn bind<T, C>(self, codec: C) -> Self
    where
        T: Any + Send + Sync,
        C: Codec<Arc<T>> + 'static,
    {
        let description = std::any::type_name::<T>().to_string();
        self.push(
            description,
            Matcher::Exact(TypeId::of::<T>()),
            Arc::new(TypedCodec::<T, C>::new(codec)),
        )
    }

    /// Binds every value accepted by `predicate`.
    pub fn bind_when<P, C>(self, description: impl Into<String>, predicate: P, codec: C) -> Self
    where
        P: Fn(&ObjectRef) -> bool + Send + Sync + 'static,
        C: Codec<ObjectRef> + 'static,
    {
        self.push(
            description.into(),
            Matcher::Predicate(Box::new(predicate)),
            Arc::new(codec),
        )
    }

    fn push(
        mut self,
        description: String,
        matcher: Matcher,
        codec: Arc<dyn Codec<ObjectRef>>,
    ) -> Self {
        let tag = self.bindings.len() as u32 + 1;
        self.bindings.push(Binding {
            tag,
            description,
            matcher,
            codec,
        });
        self
    }

    /// Finishes the list.
    pub fn build(self) -> Arc<Bindings> {
        Arc::new(Bindings {
            bindings: self.bindings,
        })
    }
}

/// Returns `true` if `obj` is a `T`.
pub fn is<T: Any>(obj: &ObjectRef) -> bool {
    GraphObject::as_any(&**obj).is::<T>()
}

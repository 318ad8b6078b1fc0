use super::class::{ClassLevel, Externalizable, FieldAccess, ReplaceHooks, Serializable};
use super::properties::Properties;
use super::stream::{ObjectInput, ObjectOutput};
use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};
use crate::object::{downcast, type_id_of, type_name_of, ObjectRef};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

// Hook failures raised through the stream come back as `CodecError`s and
// are passed through unchanged; anything else is a user failure.
fn hook_failure(
    class: &'static str,
    method: &'static str,
    error: Box<dyn std::error::Error + Send + Sync>,
) -> CodecError {
    match error.downcast::<CodecError>() {
        Ok(codec) => *codec,
        Err(source) => CodecError::Callback {
            class: class.to_string(),
            method,
            source,
        },
    }
}

fn expect<T: Any + Send + Sync>(obj: &ObjectRef) -> CodecResult<Arc<T>> {
    downcast::<T>(obj).ok_or_else(|| CodecError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        found: type_name_of(obj).to_string(),
    })
}

/// Type-erased protocol operations of one registered class.
pub(crate) trait ClassHandler: Send + Sync {
    fn instantiate(&self) -> ObjectRef;
    fn write_payload(&self, obj: &ObjectRef, ctx: &mut WriteContext) -> CodecResult<()>;
    fn read_payload(&self, obj: &ObjectRef, ctx: &mut ReadContext) -> CodecResult<()>;
    fn write_replace(&self, obj: &ObjectRef) -> CodecResult<Option<ObjectRef>>;
    fn read_resolve(&self, obj: ObjectRef) -> CodecResult<ObjectRef>;
    fn resolves(&self) -> bool;
}

/// A registered class.
pub(crate) struct ClassDescriptor {
    pub(crate) name: &'static str,
    handler: Box<dyn ClassHandler>,
}

impl std::ops::Deref for ClassDescriptor {
    type Target = dyn ClassHandler;

    fn deref(&self) -> &Self::Target {
        &*self.handler
    }
}

struct SerializableHandler<T> {
    levels: Vec<ClassLevel<T>>,
    hooks: ReplaceHooks<T>,
}

fn write_fields<T>(
    ctx: &mut WriteContext,
    this: &T,
    fields: &[FieldAccess<T>],
) -> CodecResult<()> {
    for field in fields {
        let value = (field.get)(this);
        let trace = ctx.trace().field(field.name);
        ctx.with_property_trace(trace, |ctx| ctx.write_value(&value))?;
    }
    Ok(())
}

fn read_fields<T>(
    ctx: &mut ReadContext,
    this: &T,
    class: &'static str,
    fields: &[FieldAccess<T>],
) -> CodecResult<()> {
    for field in fields {
        let trace = ctx.trace().field(field.name);
        let value = ctx.with_property_trace(trace, |ctx| ctx.read_value())?;
        (field.set)(this, value).map_err(|err| hook_failure(class, "defaultReadObject", err))?;
    }
    Ok(())
}

impl<T: Serializable> ClassHandler for SerializableHandler<T> {
    fn instantiate(&self) -> ObjectRef {
        Arc::new(T::blank())
    }

    fn write_payload(&self, obj: &ObjectRef, ctx: &mut WriteContext) -> CodecResult<()> {
        let this = expect::<T>(obj)?;
        for level in &self.levels {
            match level.write_object {
                Some(hook) => {
                    let defaults =
                        |ctx: &mut WriteContext| write_fields(ctx, &*this, &level.fields);
                    let mut out = ObjectOutput::for_level(ctx, level.name, &defaults);
                    hook(&this, &mut out)
                        .map_err(|err| hook_failure(level.name, "writeObject", err))?;
                }
                None => write_fields(ctx, &*this, &level.fields)?,
            }
        }
        Ok(())
    }

    fn read_payload(&self, obj: &ObjectRef, ctx: &mut ReadContext) -> CodecResult<()> {
        let this = expect::<T>(obj)?;
        for level in &self.levels {
            match level.read_object {
                Some(hook) => {
                    let defaults = |ctx: &mut ReadContext| {
                        read_fields(ctx, &*this, level.name, &level.fields)
                    };
                    let mut input = ObjectInput::for_level(ctx, level.name, &defaults);
                    hook(&this, &mut input)
                        .map_err(|err| hook_failure(level.name, "readObject", err))?;
                }
                None => read_fields(ctx, &*this, level.name, &level.fields)?,
            }
        }
        Ok(())
    }

    fn write_replace(&self, obj: &ObjectRef) -> CodecResult<Option<ObjectRef>> {
        let Some(hook) = self.hooks.write_replace else {
            return Ok(None);
        };
        hook(&expect::<T>(obj)?).map_err(|err| hook_failure(T::CLASS_NAME, "writeReplace", err))
    }

    fn read_resolve(&self, obj: ObjectRef) -> CodecResult<ObjectRef> {
        let Some(hook) = self.hooks.read_resolve else {
            return Ok(obj);
        };
        hook(expect::<T>(&obj)?).map_err(|err| hook_failure(T::CLASS_NAME, "readResolve", err))
    }

    fn resolves(&self) -> bool {
        self.hooks.read_resolve.is_some()
    }
}

struct ExternalizableHandler<T> {
    hooks: ReplaceHooks<T>,
}

impl<T: Externalizable> ClassHandler for ExternalizableHandler<T> {
    fn instantiate(&self) -> ObjectRef {
        Arc::new(T::blank())
    }

    fn write_payload(&self, obj: &ObjectRef, ctx: &mut WriteContext) -> CodecResult<()> {
        let this = expect::<T>(obj)?;
        let mut out = ObjectOutput::external(ctx, T::CLASS_NAME);
        this.write_external(&mut out)
            .map_err(|err| hook_failure(T::CLASS_NAME, "writeExternal", err))
    }

    fn read_payload(&self, obj: &ObjectRef, ctx: &mut ReadContext) -> CodecResult<()> {
        let this = expect::<T>(obj)?;
        let mut input = ObjectInput::external(ctx, T::CLASS_NAME);
        this.read_external(&mut input)
            .map_err(|err| hook_failure(T::CLASS_NAME, "readExternal", err))
    }

    fn write_replace(&self, obj: &ObjectRef) -> CodecResult<Option<ObjectRef>> {
        let Some(hook) = self.hooks.write_replace else {
            return Ok(None);
        };
        hook(&expect::<T>(obj)?).map_err(|err| hook_failure(T::CLASS_NAME, "writeReplace", err))
    }

    fn read_resolve(&self, obj: ObjectRef) -> CodecResult<ObjectRef> {
        let Some(hook) = self.hooks.read_resolve else {
            return Ok(obj);
        };
        hook(expect::<T>(&obj)?).map_err(|err| hook_failure(T::CLASS_NAME, "readResolve", err))
    }

    fn resolves(&self) -> bool {
        self.hooks.read_resolve.is_some()
    }
}

/// Classes that take part in the legacy serialization protocol.
///
/// Class levels and hooks are resolved once, at registration. Registering
/// a second class under an existing name replaces the first.
#[derive(Default)]
pub struct SerializationRegistry {
    by_type: HashMap<TypeId, Arc<ClassDescriptor>>,
    by_name: HashMap<&'static str, Arc<ClassDescriptor>>,
}

impl SerializationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in classes, such as [`Properties`].
    pub fn with_defaults() -> Self {
        Self::new().register::<Properties>()
    }

    /// Registers a [`Serializable`] class.
    pub fn register<T: Serializable>(self) -> Self {
        let handler = SerializableHandler::<T> {
            levels: T::class_levels(),
            hooks: T::replace_hooks(),
        };
        self.insert::<T>(T::CLASS_NAME, Box::new(handler))
    }

    /// Registers an [`Externalizable`] class.
    pub fn register_externalizable<T: Externalizable>(self) -> Self {
        let handler = ExternalizableHandler::<T> {
            hooks: T::replace_hooks(),
        };
        self.insert::<T>(T::CLASS_NAME, Box::new(handler))
    }

    fn insert<T: Any>(mut self, name: &'static str, handler: Box<dyn ClassHandler>) -> Self {
        let descriptor = Arc::new(ClassDescriptor { name, handler });
        if let Some(previous) = self.by_name.insert(name, Arc::clone(&descriptor)) {
            self.by_type.retain(|_, d| !Arc::ptr_eq(d, &previous));
        }
        self.by_type.insert(TypeId::of::<T>(), descriptor);
        self
    }

    /// Returns `true` if the runtime type of `obj` is registered.
    pub fn handles(&self, obj: &ObjectRef) -> bool {
        self.by_type.contains_key(&type_id_of(obj))
    }

    /// Returns the number of registered classes.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if no class is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub(crate) fn descriptor_of(&self, obj: &ObjectRef) -> Option<&Arc<ClassDescriptor>> {
        self.by_type.get(&type_id_of(obj))
    }

    pub(crate) fn descriptor_named(&self, name: &str) -> Option<&Arc<ClassDescriptor>> {
        self.by_name.get(name)
    }
}

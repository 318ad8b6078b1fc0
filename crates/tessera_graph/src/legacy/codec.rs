use super::registry::{ClassDescriptor, SerializationRegistry};
use crate::bindings::BindingsBuilder;
use crate::codec::Codec;
use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};
use crate::object::{identity_of, type_id_of, type_name_of, ObjectRef};
use std::sync::Arc;

/// The object was replaced by `writeReplace`; the replacement follows.
const TAG_REPLACED: u8 = 0;
/// The object itself follows: class name, then one payload per class level.
const TAG_DIRECT: u8 = 1;
/// The object was replaced by a registered class, written without `writeReplace`.
const TAG_REPLACED_DIRECT: u8 = 2;

/// Codec for every class registered in a [`SerializationRegistry`].
pub struct LegacySerializationCodec {
    registry: Arc<SerializationRegistry>,
}

impl LegacySerializationCodec {
    /// Creates a codec for the classes in `registry`.
    pub fn new(registry: Arc<SerializationRegistry>) -> Self {
        Self { registry }
    }

    /// Appends a binding for every class in `registry` to `builder`.
    pub fn bind(builder: BindingsBuilder, registry: Arc<SerializationRegistry>) -> BindingsBuilder {
        let matcher = Arc::clone(&registry);
        builder.bind_when(
            "legacy serializable classes",
            move |obj| matcher.handles(obj),
            Self::new(registry),
        )
    }

    fn descriptor_of(&self, obj: &ObjectRef) -> CodecResult<Arc<ClassDescriptor>> {
        self.registry
            .descriptor_of(obj)
            .cloned()
            .ok_or_else(|| CodecError::Unknown {
                kind: "class",
                name: type_name_of(obj).to_string(),
            })
    }

    // Applies `writeReplace` until the result stops changing: no
    // replacement, the same object, an object of the same type, or one
    // already produced by this loop.
    fn replacement_for(&self, obj: &ObjectRef) -> CodecResult<Option<ObjectRef>> {
        let mut current = ObjectRef::clone(obj);
        let mut visited = vec![identity_of(obj)];
        while let Some(descriptor) = self.registry.descriptor_of(&current) {
            let Some(next) = descriptor.write_replace(&current)? else {
                break;
            };
            if visited.contains(&identity_of(&next)) {
                break;
            }
            visited.push(identity_of(&next));
            let same_type = type_id_of(&next) == type_id_of(&current);
            current = next;
            if same_type {
                break;
            }
        }
        Ok((identity_of(&current) != identity_of(obj)).then_some(current))
    }
}

impl LegacySerializationCodec {
    fn write_direct(&self, ctx: &mut WriteContext, obj: &ObjectRef) -> CodecResult<()> {
        let descriptor = self.descriptor_of(obj)?;
        ctx.write_u8(TAG_DIRECT)?;
        ctx.write_string(descriptor.name)?;
        let resolves = descriptor.resolves();
        let trace = ctx.trace().bean(descriptor.name);
        let target = ObjectRef::clone(obj);
        let payload = move |ctx: &mut WriteContext| {
            ctx.with_property_trace(trace, |ctx| descriptor.write_payload(&target, ctx))
        };
        // A resolving class is decoded inline, so it is written inline too.
        if resolves {
            payload(ctx)
        } else {
            ctx.nested(Box::new(payload))
        }
    }
}

impl Codec<ObjectRef> for LegacySerializationCodec {
    fn encode(&self, ctx: &mut WriteContext, obj: &ObjectRef) -> CodecResult<()> {
        ctx.encode_preserving_identity(obj, |ctx| match self.replacement_for(obj)? {
            // The replacement is final: its own writeReplace has already run.
            Some(replacement) if self.registry.handles(&replacement) => {
                ctx.write_u8(TAG_REPLACED_DIRECT)?;
                ctx.encode_preserving_identity(&replacement, |ctx| {
                    self.write_direct(ctx, &replacement)
                })
            }
            Some(replacement) => {
                ctx.write_u8(TAG_REPLACED)?;
                ctx.write_object(&replacement)
            }
            None => self.write_direct(ctx, obj),
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<ObjectRef> {
        ctx.decode_preserving_identity(|ctx, id| match ctx.read_u8()? {
            TAG_REPLACED => ctx.read_object(),
            TAG_REPLACED_DIRECT => self.decode(ctx),
            TAG_DIRECT => {
                let name = ctx.read_shared_string()?;
                let descriptor = self
                    .registry
                    .descriptor_named(&name)
                    .cloned()
                    .ok_or_else(|| CodecError::Unknown {
                        kind: "class",
                        name: name.to_string(),
                    })?;
                let instance = descriptor.instantiate();
                ctx.register(id, ObjectRef::clone(&instance));
                let trace = ctx.trace().bean(descriptor.name);
                if descriptor.resolves() {
                    ctx.with_property_trace(trace, |ctx| descriptor.read_payload(&instance, ctx))?;
                    return descriptor.read_resolve(instance);
                }
                let target = ObjectRef::clone(&instance);
                ctx.nested(Box::new(move |ctx: &mut ReadContext| {
                    ctx.with_property_trace(trace, |ctx| descriptor.read_payload(&target, ctx))
                }))?;
                Ok(instance)
            }
            tag => Err(CodecError::malformed(format!(
                "invalid legacy serialization tag {tag}"
            ))),
        })
    }
}

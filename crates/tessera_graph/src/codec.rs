//! The codec abstraction.

use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};
use crate::object::{downcast, type_name_of, ObjectRef};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Encodes values of type `T` into a stream and decodes them back.
///
/// A codec that writes nested graph values must go through
/// [`WriteContext::write_value`] so identity and bindings apply to them.
pub trait Codec<T>: Send + Sync {
    /// Writes `value`.
    fn encode(&self, ctx: &mut WriteContext, value: &T) -> CodecResult<()>;

    /// Reads a value written by [`Codec::encode`].
    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<T>;
}

/// Adapts a codec for `Arc<T>` to the dynamically typed [`ObjectRef`].
pub struct TypedCodec<T, C> {
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> TypedCodec<T, C> {
    /// Wraps `codec`.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            _marker: PhantomData,
        }
    }
}

impl<T, C> Codec<ObjectRef> for TypedCodec<T, C>
where
    T: Any + Send + Sync,
    C: Codec<Arc<T>>,
{
    fn encode(&self, ctx: &mut WriteContext, value: &ObjectRef) -> CodecResult<()> {
        let typed = downcast::<T>(value).ok_or_else(|| CodecError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: type_name_of(value).to_string(),
        })?;
        self.codec.encode(ctx, &typed)
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<ObjectRef> {
        let typed: Arc<T> = self.codec.decode(ctx)?;
        Ok(typed)
    }
}

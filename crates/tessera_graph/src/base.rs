//! Codecs for the built-in value types and the default binding list.

use crate::bindings::{Bindings, BindingsBuilder};
use crate::codec::Codec;
use crate::context::{ReadContext, WriteContext};
use crate::deferred::{Function, FunctionCodec, LambdaRegistry, Supplier, SupplierCodec};
use crate::error::CodecResult;
use crate::legacy::{LegacySerializationCodec, SerializationRegistry};
use crate::object::{ObjectRef, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tessera_common::ContentHash;
use tessera_diagnostics::PropertyKind;

// Scalars are objects too: a value shared by two edges decodes shared.
macro_rules! scalar_codec {
    ($(#[$doc:meta])* $name:ident, $ty:ty, |$ctx:ident, $value:ident| $write:expr, |$rctx:ident| $read:expr) => {
        $(#[$doc])*
        pub struct $name;

        impl Codec<Arc<$ty>> for $name {
            fn encode(&self, ctx: &mut WriteContext, value: &Arc<$ty>) -> CodecResult<()> {
                let obj: ObjectRef = value.clone();
                ctx.encode_preserving_identity(&obj, |$ctx| {
                    let $value: &$ty = value;
                    $write
                })
            }

            fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<$ty>> {
                ctx.decode_preserving_identity_as(|$rctx, _| Ok(Arc::new($read)))
            }
        }
    };
}

scalar_codec!(
    /// Codec for `bool`.
    BoolCodec, bool, |ctx, v| ctx.write_bool(*v), |ctx| ctx.read_bool()?
);
scalar_codec!(
    /// Codec for `i32`.
    I32Codec, i32, |ctx, v| ctx.write_i32(*v), |ctx| ctx.read_i32()?
);
scalar_codec!(
    /// Codec for `i64`.
    I64Codec, i64, |ctx, v| ctx.write_i64(*v), |ctx| ctx.read_i64()?
);
scalar_codec!(
    /// Codec for `u64`.
    U64Codec, u64, |ctx, v| ctx.write_u64(*v), |ctx| ctx.read_u64()?
);
scalar_codec!(
    /// Codec for `f64`.
    F64Codec, f64, |ctx, v| ctx.write_f64(*v), |ctx| ctx.read_f64()?
);
scalar_codec!(
    /// Codec for `String`.
    StringCodec, String, |ctx, v| ctx.write_string(v), |ctx| ctx.read_string()?
);
scalar_codec!(
    /// Codec for `PathBuf`, written as a lossy UTF-8 string.
    PathCodec, PathBuf, |ctx, v| ctx.write_string(&v.to_string_lossy()),
    |ctx| PathBuf::from(ctx.read_string()?)
);
scalar_codec!(
    /// Codec for [`ContentHash`].
    HashCodec, ContentHash, |ctx, v| ctx.write_hash(v), |ctx| ctx.read_hash()?
);

/// Codec for lists of graph values. Preserves list identity.
pub struct ListCodec;

impl Codec<Arc<Vec<Value>>> for ListCodec {
    fn encode(&self, ctx: &mut WriteContext, value: &Arc<Vec<Value>>) -> CodecResult<()> {
        let obj: ObjectRef = value.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_len(value.len())?;
            for (index, element) in value.iter().enumerate() {
                let trace = ctx.trace().property(PropertyKind::Element, index.to_string());
                ctx.with_property_trace(trace, |ctx| ctx.write_value(element))?;
            }
            Ok(())
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<Vec<Value>>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let len = ctx.read_len()?;
            let mut elements = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                elements.push(ctx.read_value()?);
            }
            Ok(Arc::new(elements))
        })
    }
}

/// Codec for string-keyed maps of graph values. Preserves map identity.
pub struct StringMapCodec;

impl Codec<Arc<BTreeMap<String, Value>>> for StringMapCodec {
    fn encode(
        &self,
        ctx: &mut WriteContext,
        value: &Arc<BTreeMap<String, Value>>,
    ) -> CodecResult<()> {
        let obj: ObjectRef = value.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_len(value.len())?;
            for (key, element) in value.iter() {
                ctx.write_string(key)?;
                let trace = ctx.trace().property(PropertyKind::Element, key.as_str());
                ctx.with_property_trace(trace, |ctx| ctx.write_value(element))?;
            }
            Ok(())
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<BTreeMap<String, Value>>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let len = ctx.read_len()?;
            let mut map = BTreeMap::new();
            for _ in 0..len {
                let key = ctx.read_string()?;
                map.insert(key, ctx.read_value()?);
            }
            Ok(Arc::new(map))
        })
    }
}

/// Two graph values.
#[derive(Debug, Clone, Default)]
pub struct Pair {
    /// The first value.
    pub first: Value,
    /// The second value.
    pub second: Value,
}

impl Pair {
    /// Creates a pair.
    pub fn new(first: Value, second: Value) -> Self {
        Self { first, second }
    }
}

/// Codec for [`Pair`]. Preserves pair identity.
pub struct PairCodec;

impl Codec<Arc<Pair>> for PairCodec {
    fn encode(&self, ctx: &mut WriteContext, value: &Arc<Pair>) -> CodecResult<()> {
        let obj: ObjectRef = value.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_value(&value.first)?;
            ctx.write_value(&value.second)
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<Pair>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let first = ctx.read_value()?;
            let second = ctx.read_value()?;
            Ok(Arc::new(Pair { first, second }))
        })
    }
}

/// Binds the built-in value types.
pub fn base_bindings(builder: BindingsBuilder) -> BindingsBuilder {
    builder
        .bind::<String, _>(StringCodec)
        .bind::<bool, _>(BoolCodec)
        .bind::<i32, _>(I32Codec)
        .bind::<i64, _>(I64Codec)
        .bind::<u64, _>(U64Codec)
        .bind::<f64, _>(F64Codec)
        .bind::<PathBuf, _>(PathCodec)
        .bind::<ContentHash, _>(HashCodec)
        .bind::<Vec<Value>, _>(ListCodec)
        .bind::<BTreeMap<String, Value>, _>(StringMapCodec)
        .bind::<Pair, _>(PairCodec)
}

/// Returns the standard binding list: built-in values, deferred values,
/// then every class known to `registry`.
///
/// Callers append their own bindings to the returned builder.
pub fn default_bindings(
    registry: Arc<SerializationRegistry>,
    lambdas: Arc<LambdaRegistry>,
) -> BindingsBuilder {
    let builder = base_bindings(Bindings::builder())
        .bind::<Supplier, _>(SupplierCodec::new(Arc::clone(&lambdas)))
        .bind::<Function, _>(FunctionCodec::new(lambdas));
    LegacySerializationCodec::bind(builder, registry)
}

//! Identity-preserving object graph serialization.
//!
//! A graph of [`ObjectRef`] values is written through a [`WriteContext`] and
//! read back through a [`ReadContext`]. Per-type behavior comes from
//! [`Codec`] implementations selected by an ordered list of [`Bindings`];
//! the framework itself knows no concrete types. Objects that are reachable
//! more than once are written once and back-referenced afterwards, so
//! aliasing and cycles survive a round trip.
//!
//! On top of the framework this crate provides:
//! - [`base`]: codecs for strings, numbers, paths, lists, maps and pairs,
//! - [`legacy`]: emulation of the legacy serialization protocol
//!   (`writeObject`/`readObject` per class level, `Externalizable`,
//!   `writeReplace`/`readResolve`),
//! - [`deferred`]: suppliers and functions that are described when
//!   encoded and only evaluated when the decoded value is invoked.

#![warn(missing_docs)]

pub mod base;
pub mod bindings;
pub mod codec;
pub mod context;
pub mod deferred;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod legacy;
pub mod object;

pub use base::{default_bindings, Pair};
pub use bindings::{Binding, Bindings, BindingsBuilder};
pub use codec::{Codec, TypedCodec};
pub use context::{CodecSettings, ReadContext, WriteContext};
pub use deferred::{Function, LambdaRegistry, Supplier};
pub use encoding::{Decoder, Encoder, SharedBuffer};
pub use error::{CodecError, CodecResult};
pub use legacy::{
    ClassLevel, Externalizable, HookResult, ObjectInput, ObjectOutput, Properties, ReplaceHooks,
    Serializable, SerializationRegistry,
};
pub use object::{downcast, object, type_name_of, value, GraphObject, ObjectRef, Value};

//! Emulation of the legacy object serialization protocol.
//!
//! Classes opt in by implementing [`Serializable`] or [`Externalizable`] and
//! being registered in a [`SerializationRegistry`]. The protocol is replayed
//! faithfully:
//!
//! - each class level is written superclass first, through its
//!   `writeObject` hook when it has one and through its default fields
//!   otherwise,
//! - `Externalizable` classes write themselves and skip field handling,
//! - `writeReplace` is applied until it reaches a fixed point, and the
//!   `readResolve` result becomes the object every back reference sees.

mod class;
mod codec;
mod properties;
mod registry;
mod stream;

pub use class::{
    ClassLevel, Externalizable, FieldAccess, HookResult, ReadObjectHook, ReplaceHooks,
    Serializable, WriteObjectHook,
};
pub use codec::LegacySerializationCodec;
pub use properties::Properties;
pub use registry::SerializationRegistry;
pub use stream::{ObjectInput, ObjectOutput};

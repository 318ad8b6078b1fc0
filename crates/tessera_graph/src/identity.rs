//! Object identity tables for the write and read side of a stream.

use crate::error::{CodecError, CodecResult};
use crate::object::{identity_of, ObjectRef};
use std::collections::HashMap;

/// Marker written before the payload of an object seen for the first time.
pub(crate) const TAG_NEW: u8 = 0;
/// Marker written before the id of an object that was already written.
pub(crate) const TAG_REF: u8 = 1;

/// Assigns ids to objects in first-write order.
#[derive(Default)]
pub struct WriteIdentities {
    ids: HashMap<usize, u32>,
    // Keeps written objects alive so their addresses cannot be reused.
    retained: Vec<ObjectRef>,
}

impl WriteIdentities {
    /// Returns the id of an object that was already written.
    pub fn get_id(&self, obj: &ObjectRef) -> Option<u32> {
        self.ids.get(&identity_of(obj)).copied()
    }

    /// Assigns the next id to `obj`.
    pub fn put_instance(&mut self, obj: &ObjectRef) -> u32 {
        let id = self.retained.len() as u32;
        self.ids.insert(identity_of(obj), id);
        self.retained.push(ObjectRef::clone(obj));
        id
    }

    /// Returns the number of distinct objects written.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    /// Returns `true` if no object was written yet.
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }
}

/// Maps ids back to decoded objects.
#[derive(Default)]
pub struct ReadIdentities {
    slots: Vec<Option<ObjectRef>>,
}

impl ReadIdentities {
    /// Reserves the next id. The slot is empty until the object is registered.
    pub fn reserve(&mut self) -> u32 {
        self.slots.push(None);
        (self.slots.len() - 1) as u32
    }

    /// Stores the object for `id`, replacing any earlier registration.
    pub fn put_instance(&mut self, id: u32, obj: ObjectRef) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = Some(obj);
        }
    }

    /// Returns the object registered for `id`.
    pub fn get_instance(&self, id: u32) -> CodecResult<ObjectRef> {
        self.slots
            .get(id as usize)
            .and_then(Option::clone)
            .ok_or(CodecError::UnresolvedReference(id))
    }
}

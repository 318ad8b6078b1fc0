//! Interned identifiers used for string deduplication in encoded streams.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// A handle to an interned string.
///
/// Identifiers are assigned densely in interning order starting at zero, so a
/// reader that sees strings in the same order can rebuild the same table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Creates an `Ident` from a raw `u32` index.
    ///
    /// This is primarily intended for deserialization and testing.
    /// In normal use, identifiers should be created through [`Interner::get_or_intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `Ident` wraps a `u32` which is always a valid `usize` on 32-bit and
// 64-bit platforms. `try_from_usize` rejects values that don't fit in `u32`.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// Thread-safe string interner backed by [`lasso::ThreadedRodeo`].
///
/// Encoders use one interner per stream so that repeated strings (paths,
/// class names, property keys) are written once and referenced by index
/// afterwards.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns a string, returning its [`Ident`]. If the string was already
    /// interned, returns the existing identifier without allocating.
    pub fn get_or_intern(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// Interns a string and reports whether this call added it.
    ///
    /// Returns `(ident, true)` the first time a string is seen and
    /// `(ident, false)` afterwards.
    pub fn intern_new(&self, s: &str) -> (Ident, bool) {
        match self.rodeo.get(s) {
            Some(ident) => (ident, false),
            None => (self.rodeo.get_or_intern(s), true),
        }
    }

    /// Returns the identifier of an already interned string.
    pub fn get(&self, s: &str) -> Option<Ident> {
        self.rodeo.get(s)
    }

    /// Resolves an [`Ident`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the `Ident` was not created by this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }

    /// Returns the number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Returns `true` if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_resolve_roundtrip() {
        let interner = Interner::new();
        let id = interner.get_or_intern("hello");
        assert_eq!(interner.resolve(id), "hello");
    }

    #[test]
    fn same_string_same_ident() {
        let interner = Interner::new();
        let a = interner.get_or_intern("world");
        let b = interner.get_or_intern("world");
        assert_eq!(a, b);
    }

    #[test]
    fn intern_new_reports_first_sighting() {
        let interner = Interner::new();
        let (a, fresh) = interner.intern_new("key");
        assert!(fresh);
        let (b, fresh) = interner.intern_new("key");
        assert!(!fresh);
        assert_eq!(a, b);
    }

    #[test]
    fn idents_are_dense() {
        let interner = Interner::new();
        assert!(interner.is_empty());
        assert_eq!(interner.get_or_intern("a").as_raw(), 0);
        assert_eq!(interner.get_or_intern("b").as_raw(), 1);
        assert_eq!(interner.get_or_intern("a").as_raw(), 0);
        assert_eq!(interner.len(), 2);
        assert!(interner.get("c").is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let id = Ident(42);
        let json = serde_json::to_string(&id).unwrap();
        let back: Ident = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}

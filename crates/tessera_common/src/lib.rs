//! Shared foundational types used across the Tessera configuration cache.
//!
//! This crate provides content hashing, hierarchical project identity paths
//! and a string interner used for stream-level string deduplication.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod path;

pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use path::{ParsePathError, ProjectPath};

//! Diagnostic codes with category prefixes for structured problem identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Problems that make a cache entry unusable or incomplete, prefixed with `P`.
    Problem,
    /// Build configuration inputs recorded in the fingerprint, prefixed with `I`.
    Input,
    /// Failures raised by user serialization hooks or value sources, prefixed with `U`.
    User,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Problem => 'P',
            Category::Input => 'I',
            Category::User => 'U',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g. `P101` or `I004`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// A value of a type with no registered codec was reached.
    pub const UNSUPPORTED_TYPE: Self = Self::new(Category::Problem, 101);
    /// A legacy serialization stream feature that cannot be emulated was used.
    pub const UNSUPPORTED_SERIALIZATION_FEATURE: Self = Self::new(Category::Problem, 102);
    /// A project or service could not be re-resolved while decoding.
    pub const UNRESOLVED_REFERENCE: Self = Self::new(Category::Problem, 103);
    /// A value source failed while computing its value.
    pub const VALUE_SOURCE_FAILURE: Self = Self::new(Category::User, 201);
    /// A file read while configuring the build.
    pub const INPUT_FILE: Self = Self::new(Category::Input, 1);
    /// A directory listed while configuring the build.
    pub const INPUT_DIRECTORY_CONTENT: Self = Self::new(Category::Input, 2);
    /// A file system entry checked for existence or type.
    pub const INPUT_FILE_SYSTEM_ENTRY: Self = Self::new(Category::Input, 3);
    /// A system property read while configuring the build.
    pub const INPUT_SYSTEM_PROPERTY: Self = Self::new(Category::Input, 4);
    /// An environment variable read while configuring the build.
    pub const INPUT_ENVIRONMENT_VARIABLE: Self = Self::new(Category::Input, 5);
    /// A value obtained from a custom value source.
    pub const INPUT_VALUE_SOURCE: Self = Self::new(Category::Input, 6);
    /// The output of an external process.
    pub const INPUT_EXTERNAL_PROCESS: Self = Self::new(Category::Input, 7);
    /// A build property read with fine-grained tracking.
    pub const INPUT_BUILD_PROPERTY: Self = Self::new(Category::Input, 8);

    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

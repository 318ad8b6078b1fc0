//! Messages made of plain text and code references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One piece of a [`StructuredMessage`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Fragment {
    /// Plain prose.
    Text(String),
    /// A name from the build: a type, a file, a property key. Rendered in backticks.
    Reference(String),
}

/// A human-readable message that keeps code references distinguishable
/// from the surrounding prose.
///
/// ```
/// use tessera_diagnostics::StructuredMessage;
///
/// let message = StructuredMessage::new()
///     .text("system property ")
///     .reference("user.home");
/// assert_eq!(message.to_string(), "system property `user.home`");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StructuredMessage {
    fragments: Vec<Fragment>,
}

impl StructuredMessage {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends plain text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Text(text.into()));
        self
    }

    /// Appends a code reference.
    pub fn reference(mut self, name: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Reference(name.into()));
        self
    }

    /// Returns the fragments in order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Returns the referenced names in order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Reference(name) => Some(name.as_str()),
            Fragment::Text(_) => None,
        })
    }
}

impl fmt::Display for StructuredMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => f.write_str(text)?,
                Fragment::Reference(name) => write!(f, "`{name}`")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_references_in_backticks() {
        let m = StructuredMessage::new()
            .text("file ")
            .reference("settings.toml")
            .text(" was read");
        assert_eq!(m.to_string(), "file `settings.toml` was read");
        assert_eq!(m.references().collect::<Vec<_>>(), vec!["settings.toml"]);
    }

    #[test]
    fn empty_message() {
        assert_eq!(StructuredMessage::new().to_string(), "");
        assert!(StructuredMessage::new().fragments().is_empty());
    }
}

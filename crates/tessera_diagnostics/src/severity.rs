//! Problem severity levels ordered from least to most severe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity level of a reported problem.
///
/// Inputs sort before warnings, warnings before errors. Renderers list
/// problems in descending severity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// An observed build input, listed for the report only.
    Input,
    /// A problem that was tolerated, e.g. because problems are configured as warnings.
    Warning,
    /// A problem that makes the stored entry untrustworthy.
    Error,
}

impl Severity {
    /// Returns `true` if this severity is [`Error`](Severity::Error).
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Input => write!(f, "input"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Severity::Input < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn inputs_display_as_inputs() {
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Warning), "warning");
        assert_eq!(format!("{}", Severity::Input), "input");
    }
}

//! Problems and observed inputs reported during capture and serialization.

use crate::code::DiagnosticCode;
use crate::documentation::DocumentationSection;
use crate::message::StructuredMessage;
use crate::severity::Severity;
use crate::trace::PropertyTrace;
use serde::{Deserialize, Serialize};

/// A located, documented message about the configuration cache.
///
/// The same shape is used for genuine problems (an unsupported type, a
/// failing value source) and for observed inputs listed in the report, the
/// latter with [`Severity::Input`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// The severity level of this problem.
    pub severity: Severity,
    /// The code identifying the kind of problem.
    pub code: DiagnosticCode,
    /// Where the problem was found.
    pub trace: PropertyTrace,
    /// What went wrong.
    pub message: StructuredMessage,
    /// Manual section explaining the problem, if any.
    pub documentation: Option<DocumentationSection>,
    /// Rendered cause, when the problem was raised by a failure.
    pub exception: Option<String>,
}

impl Problem {
    /// Creates a new error-severity problem.
    pub fn error(code: DiagnosticCode, trace: PropertyTrace, message: StructuredMessage) -> Self {
        Self::new(Severity::Error, code, trace, message)
    }

    /// Creates a new warning-severity problem.
    pub fn warning(code: DiagnosticCode, trace: PropertyTrace, message: StructuredMessage) -> Self {
        Self::new(Severity::Warning, code, trace, message)
    }

    /// Creates an observed-input record.
    pub fn input(code: DiagnosticCode, trace: PropertyTrace, message: StructuredMessage) -> Self {
        Self::new(Severity::Input, code, trace, message)
    }

    fn new(
        severity: Severity,
        code: DiagnosticCode,
        trace: PropertyTrace,
        message: StructuredMessage,
    ) -> Self {
        Self {
            severity,
            code,
            trace,
            message,
            documentation: None,
            exception: None,
        }
    }

    /// Attaches a manual section.
    pub fn with_documentation(mut self, section: DocumentationSection) -> Self {
        self.documentation = Some(section);
        self
    }

    /// Attaches an optional manual section.
    pub fn with_optional_documentation(mut self, section: Option<DocumentationSection>) -> Self {
        self.documentation = section;
        self
    }

    /// Attaches the rendered cause.
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_error() {
        let problem = Problem::error(
            DiagnosticCode::UNSUPPORTED_TYPE,
            PropertyTrace::Runtime,
            StructuredMessage::new().text("cannot serialize"),
        );
        assert_eq!(problem.severity, Severity::Error);
        assert_eq!(problem.message.to_string(), "cannot serialize");
        assert!(problem.documentation.is_none());
    }

    #[test]
    fn builder_methods() {
        let problem = Problem::input(
            DiagnosticCode::INPUT_SYSTEM_PROPERTY,
            PropertyTrace::Unknown,
            StructuredMessage::new().text("system property ").reference("os.name"),
        )
        .with_documentation(DocumentationSection::RequirementsSysPropEnvVarRead)
        .with_exception("boom");
        assert_eq!(problem.severity, Severity::Input);
        assert_eq!(
            problem.documentation,
            Some(DocumentationSection::RequirementsSysPropEnvVarRead)
        );
        assert_eq!(problem.exception.as_deref(), Some("boom"));
    }
}

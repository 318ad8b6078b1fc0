//! Problem reporting for configuration cache capture and serialization.
//!
//! This crate provides structured [`Problem`]s carrying a [`PropertyTrace`]
//! that locates where in the build or object graph an issue was found, a
//! [`StructuredMessage`] mixing plain text and code references, and an
//! optional [`DocumentationSection`]. The thread-safe [`ProblemSink`]
//! accumulates problems and observed inputs from many worker threads, and
//! [`TerminalRenderer`] formats them for the console.

#![warn(missing_docs)]

pub mod code;
pub mod documentation;
pub mod message;
pub mod problem;
pub mod renderer;
pub mod severity;
pub mod sink;
pub mod trace;

pub use code::{Category, DiagnosticCode};
pub use documentation::DocumentationSection;
pub use message::{Fragment, StructuredMessage};
pub use problem::Problem;
pub use renderer::{ProblemRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::{ProblemReporter, ProblemSink};
pub use trace::{PropertyKind, PropertyTrace};

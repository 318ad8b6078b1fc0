//! Capture of the configuration inputs of a build.
//!
//! While a build configures, every external input it consults (files,
//! directory listings, system properties, environment variables, value
//! sources, remote scripts, dynamic dependency resolution) is reported to a
//! [`FingerprintWriter`]. The writer deduplicates the observations per sink
//! and appends one [`FingerprintEntry`] per distinct input to one of two
//! streams: the build-wide stream, or the project stream when the
//! observation happens inside a project [`CaptureScope`].
//!
//! Both streams are framed record by record and terminated by an end
//! marker written on [`FingerprintWriter::close`]. The reader reports a
//! stream without that marker as [`FingerprintError::Truncated`].

#![warn(missing_docs)]

pub mod codec;
pub mod entry;
pub mod error;
pub mod host;
pub mod reader;
pub mod scope;
pub mod scoped;
mod sink;
pub mod writer;

pub use codec::{FingerprintEntryCodec, ProjectEntryCodec};
pub use entry::{
    BuildEnvironment, ChangingValue, ChangingValueKind, FileSystemEntryKind, FingerprintEntry,
    InitScript, ProjectIdentity, ProjectSpecificEntry, PropertyScope, SimplifiedFileInput,
    ValueOutcome, ValueSourceRecord,
};
pub use error::{FingerprintError, FingerprintResult};
pub use host::{
    FileCollectionElement, FingerprintHost, InputBehavior, InputKind, ObtainedValue,
    ValueSourceParameters, WorkInputProperty,
};
pub use reader::{group_by_project, read_fingerprint_stream, ProjectFingerprints};
pub use scope::CaptureScope;
pub use scoped::ScopedFingerprintWriter;
pub use writer::FingerprintWriter;

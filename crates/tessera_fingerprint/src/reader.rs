//! Replay of fingerprint streams written by a [`ScopedFingerprintWriter`].
//!
//! [`ScopedFingerprintWriter`]: crate::ScopedFingerprintWriter

use crate::entry::{FingerprintEntry, ProjectIdentity, ProjectSpecificEntry};
use crate::error::{FingerprintError, FingerprintResult};
use crate::scoped::{FRAME_END, FRAME_RECORD};
use std::collections::BTreeMap;
use tessera_common::ProjectPath;
use tessera_graph::{Codec, CodecError, ReadContext};

/// Reads every record of a stream up to its end marker.
///
/// A stream that ends before the marker yields [`FingerprintError::Truncated`]:
/// the writer never finished, so the fingerprint is incomplete.
pub fn read_fingerprint_stream<T>(
    ctx: &mut ReadContext,
    codec: &dyn Codec<T>,
) -> FingerprintResult<Vec<T>> {
    let mut records = Vec::new();
    loop {
        let frame = match ctx.read_u8() {
            Ok(frame) => frame,
            Err(CodecError::UnexpectedEof) => {
                return Err(FingerprintError::Truncated {
                    records: records.len(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        match frame {
            FRAME_END => return Ok(records),
            FRAME_RECORD => match codec.decode(ctx) {
                Ok(record) => records.push(record),
                Err(CodecError::UnexpectedEof) => {
                    return Err(FingerprintError::Truncated {
                        records: records.len(),
                    })
                }
                Err(err) => return Err(err.into()),
            },
            other => return Err(FingerprintError::InvalidFrame(other)),
        }
    }
}

/// The records of one project, in stream order.
#[derive(Debug, Default)]
pub struct ProjectFingerprints {
    /// The identity record, if the stream contained one.
    pub identity: Option<ProjectIdentity>,
    /// Inputs captured while configuring the project.
    pub entries: Vec<FingerprintEntry>,
    /// Projects whose configured state this project depends on.
    pub dependencies: Vec<ProjectPath>,
    /// Projects this project reached into.
    pub coupled: Vec<ProjectPath>,
}

/// Groups project stream records by owning project.
pub fn group_by_project(
    records: Vec<ProjectSpecificEntry>,
) -> BTreeMap<ProjectPath, ProjectFingerprints> {
    let mut projects: BTreeMap<ProjectPath, ProjectFingerprints> = BTreeMap::new();
    for record in records {
        let project = projects.entry(record.owner().clone()).or_default();
        match record {
            ProjectSpecificEntry::ProjectIdentity(identity) => project.identity = Some(identity),
            ProjectSpecificEntry::ProjectFingerprint { entry, .. } => project.entries.push(entry),
            ProjectSpecificEntry::ProjectDependency { target, .. } => {
                project.dependencies.push(target)
            }
            ProjectSpecificEntry::CoupledProjects { target, .. } => project.coupled.push(target),
        }
    }
    projects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FingerprintEntryCodec;
    use crate::scoped::ScopedFingerprintWriter;
    use std::io::Cursor;
    use std::sync::Arc;
    use tessera_diagnostics::ProblemSink;
    use tessera_graph::{Bindings, CodecSettings, SharedBuffer};

    fn reader(bytes: Vec<u8>) -> ReadContext {
        CodecSettings::default().reader(
            Cursor::new(bytes),
            Bindings::builder().build(),
            Arc::new(ProblemSink::new()),
        )
    }

    fn written(close: bool) -> Vec<u8> {
        let buffer = SharedBuffer::new();
        let ctx = CodecSettings::default().writer(
            buffer.clone(),
            Bindings::builder().build(),
            Arc::new(ProblemSink::new()),
        );
        let writer = ScopedFingerprintWriter::new(ctx, FingerprintEntryCodec);
        writer
            .write(&FingerprintEntry::RemoteScript { uri: "https://example.org/a.tsr".into() }, None)
            .unwrap();
        writer.write(&FingerprintEntry::SystemPropertiesCleared, None).unwrap();
        if close {
            writer.close().unwrap();
        }
        buffer.bytes()
    }

    #[test]
    fn reads_until_end_marker() {
        let records = read_fingerprint_stream(&mut reader(written(true)), &FingerprintEntryCodec)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[0], FingerprintEntry::RemoteScript { uri } if uri.ends_with("a.tsr")));
    }

    #[test]
    fn missing_end_marker_is_truncated() {
        let err = read_fingerprint_stream(&mut reader(written(false)), &FingerprintEntryCodec)
            .unwrap_err();
        assert!(matches!(err, FingerprintError::Truncated { records: 2 }));
    }

    #[test]
    fn cut_record_is_truncated() {
        let mut bytes = written(true);
        bytes.truncate(4);
        let err =
            read_fingerprint_stream(&mut reader(bytes), &FingerprintEntryCodec).unwrap_err();
        assert!(matches!(err, FingerprintError::Truncated { records: 0 }));
    }
}

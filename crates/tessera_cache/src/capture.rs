//! In-memory capture of the two fingerprint streams of one build.

use std::sync::Arc;

use tessera_config::CacheOptions;
use tessera_diagnostics::ProblemReporter;
use tessera_fingerprint::{FingerprintHost, FingerprintWriter};
use tessera_graph::{Bindings, CodecSettings, SharedBuffer};

use crate::error::CacheResult;

/// A [`FingerprintWriter`] recording into in-memory streams.
///
/// Configure the build through [`writer`](Self::writer), then
/// [`finish`](Self::finish) to close the streams and take their bytes.
pub struct FingerprintCapture {
    writer: FingerprintWriter,
    build: SharedBuffer,
    project: SharedBuffer,
}

/// The closed fingerprint streams of a configured build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFingerprint {
    /// The build-wide stream.
    pub build: Vec<u8>,
    /// The project stream.
    pub project: Vec<u8>,
}

impl FingerprintCapture {
    /// Starts capturing; the build environment is recorded immediately.
    pub fn start(
        host: Arc<dyn FingerprintHost>,
        options: &CacheOptions,
        reporter: Arc<dyn ProblemReporter>,
        bindings: Arc<Bindings>,
    ) -> CacheResult<Self> {
        let build = SharedBuffer::new();
        let project = SharedBuffer::new();
        let settings = CodecSettings::from(options);
        let writer = FingerprintWriter::new(
            host,
            options.clone(),
            Arc::clone(&reporter),
            settings.writer(build.clone(), Arc::clone(&bindings), Arc::clone(&reporter)),
            settings.writer(project.clone(), bindings, reporter),
        )?;
        Ok(Self {
            writer,
            build,
            project,
        })
    }

    /// The writer build logic reports its inputs to.
    pub fn writer(&self) -> &FingerprintWriter {
        &self.writer
    }

    /// Closes both streams and returns their contents.
    pub fn finish(self) -> CacheResult<CapturedFingerprint> {
        self.writer.close()?;
        Ok(CapturedFingerprint {
            build: self.build.bytes(),
            project: self.project.bytes(),
        })
    }
}

impl std::fmt::Debug for FingerprintCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintCapture")
            .field("build_bytes", &self.build.len())
            .field("project_bytes", &self.project.len())
            .finish()
    }
}

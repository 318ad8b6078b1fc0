//! Error types for fingerprint capture and replay.

use tessera_graph::CodecError;

/// Result alias for fingerprint operations.
pub type FingerprintResult<T> = Result<T, FingerprintError>;

/// Errors raised while writing or reading a fingerprint stream.
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// Encoding or decoding a record failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The stream ends without its end marker. The fingerprint is
    /// incomplete and must not be trusted.
    #[error("fingerprint stream is truncated after {records} records")]
    Truncated {
        /// Number of complete records before the end of the stream.
        records: usize,
    },

    /// A frame tag that is neither a record nor the end marker.
    #[error("invalid fingerprint frame tag {0}")]
    InvalidFrame(u8),

    /// A record was written after the stream was closed.
    #[error("fingerprint stream is already closed")]
    Closed,
}

impl From<std::io::Error> for FingerprintError {
    fn from(err: std::io::Error) -> Self {
        FingerprintError::Codec(CodecError::Io(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_message() {
        let err = FingerprintError::Truncated { records: 3 };
        assert_eq!(err.to_string(), "fingerprint stream is truncated after 3 records");
    }

    #[test]
    fn codec_errors_are_transparent() {
        let err: FingerprintError = CodecError::UnexpectedEof.into();
        assert_eq!(err.to_string(), "unexpected end of stream");
    }
}

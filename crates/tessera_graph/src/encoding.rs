//! Low-level value encoding on top of `bincode`.
//!
//! Integers are written as variable-length integers, strings are length
//! prefixed UTF-8. When string deduplication is enabled, every string that
//! goes through [`Encoder::write_string`] is written in full the first time
//! and as a back reference afterwards.

use crate::error::{CodecError, CodecResult};
use bincode::error::{DecodeError, EncodeError};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tessera_common::{ContentHash, Interner};

/// Upper bound on a single decoded primitive, guarding against corrupt lengths.
const MAX_DECODED_SIZE: usize = 1 << 30;

fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_DECODED_SIZE>()
}

fn encode_error(err: EncodeError) -> CodecError {
    match err {
        EncodeError::Io { inner, .. } => CodecError::Io(inner),
        other => CodecError::malformed(other.to_string()),
    }
}

fn decode_error(err: DecodeError) -> CodecError {
    match err {
        DecodeError::Io { inner, .. } if inner.kind() == io::ErrorKind::UnexpectedEof => {
            CodecError::UnexpectedEof
        }
        DecodeError::Io { inner, .. } => CodecError::Io(inner),
        DecodeError::UnexpectedEnd { .. } => CodecError::UnexpectedEof,
        other => CodecError::malformed(other.to_string()),
    }
}

/// Writes primitive values to an output stream.
pub struct Encoder {
    sink: Box<dyn Write + Send>,
    strings: Option<Interner>,
    bytes_written: u64,
}

impl Encoder {
    /// Creates an encoder with string deduplication enabled.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            strings: Some(Interner::new()),
            bytes_written: 0,
        }
    }

    /// Enables or disables string deduplication. Must match the decoder.
    pub fn with_string_deduplication(mut self, enabled: bool) -> Self {
        self.strings = enabled.then(Interner::new);
        self
    }

    fn put<E: bincode::Encode>(&mut self, value: E) -> CodecResult<()> {
        let written =
            bincode::encode_into_std_write(value, &mut self.sink, config()).map_err(encode_error)?;
        self.bytes_written += written as u64;
        Ok(())
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) -> CodecResult<()> {
        self.put(value)
    }

    /// Writes a boolean.
    pub fn write_bool(&mut self, value: bool) -> CodecResult<()> {
        self.put(value)
    }

    /// Writes an unsigned 32-bit integer.
    pub fn write_u32(&mut self, value: u32) -> CodecResult<()> {
        self.put(value)
    }

    /// Writes a signed 32-bit integer.
    pub fn write_i32(&mut self, value: i32) -> CodecResult<()> {
        self.put(value)
    }

    /// Writes an unsigned 64-bit integer.
    pub fn write_u64(&mut self, value: u64) -> CodecResult<()> {
        self.put(value)
    }

    /// Writes a signed 64-bit integer.
    pub fn write_i64(&mut self, value: i64) -> CodecResult<()> {
        self.put(value)
    }

    /// Writes a 64-bit float.
    pub fn write_f64(&mut self, value: f64) -> CodecResult<()> {
        self.put(value)
    }

    /// Writes a collection length.
    pub fn write_len(&mut self, len: usize) -> CodecResult<()> {
        self.put(len as u64)
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.write_len(bytes.len())?;
        self.sink.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Writes a string, deduplicated if enabled.
    pub fn write_string(&mut self, value: &str) -> CodecResult<()> {
        let Some(strings) = &self.strings else {
            return self.put(value);
        };
        let (ident, new) = strings.intern_new(value);
        if new {
            self.put(0u32)?;
            self.put(value)
        } else {
            self.put(ident.as_raw() + 1)
        }
    }

    /// Writes an optional string.
    pub fn write_optional_string(&mut self, value: Option<&str>) -> CodecResult<()> {
        match value {
            Some(value) => {
                self.write_bool(true)?;
                self.write_string(value)
            }
            None => self.write_bool(false),
        }
    }

    /// Writes a content hash as 16 raw bytes.
    pub fn write_hash(&mut self, hash: &ContentHash) -> CodecResult<()> {
        self.put(*hash.as_bytes())
    }

    /// Writes any `serde` value in `bincode` form.
    pub fn write_serde<T: Serialize>(&mut self, value: &T) -> CodecResult<()> {
        let written = bincode::serde::encode_into_std_write(value, &mut self.sink, config())
            .map_err(encode_error)?;
        self.bytes_written += written as u64;
        Ok(())
    }

    /// Flushes the underlying stream.
    pub fn flush(&mut self) -> CodecResult<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Returns the number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Reads primitive values from an input stream.
pub struct Decoder {
    source: Box<dyn Read + Send>,
    strings: Option<Vec<Arc<str>>>,
}

impl Decoder {
    /// Creates a decoder with string deduplication enabled.
    pub fn new(source: impl Read + Send + 'static) -> Self {
        Self {
            source: Box::new(source),
            strings: Some(Vec::new()),
        }
    }

    /// Enables or disables string deduplication. Must match the encoder.
    pub fn with_string_deduplication(mut self, enabled: bool) -> Self {
        self.strings = enabled.then(Vec::new);
        self
    }

    fn take<D: bincode::Decode<()>>(&mut self) -> CodecResult<D> {
        bincode::decode_from_std_read(&mut self.source, config()).map_err(decode_error)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.take()
    }

    /// Reads a boolean.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        self.take()
    }

    /// Reads an unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.take()
    }

    /// Reads a signed 32-bit integer.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        self.take()
    }

    /// Reads an unsigned 64-bit integer.
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        self.take()
    }

    /// Reads a signed 64-bit integer.
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        self.take()
    }

    /// Reads a 64-bit float.
    pub fn read_f64(&mut self) -> CodecResult<f64> {
        self.take()
    }

    /// Reads a collection length.
    pub fn read_len(&mut self) -> CodecResult<usize> {
        let len: u64 = self.take()?;
        usize::try_from(len)
            .ok()
            .filter(|len| *len <= MAX_DECODED_SIZE)
            .ok_or_else(|| CodecError::malformed(format!("length {len} out of range")))
    }

    /// Reads a length-prefixed byte array.
    pub fn read_bytes(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.read_len()?;
        // Grows with the data actually present, not the declared length.
        let mut bytes = Vec::with_capacity(len.min(64 * 1024));
        (&mut self.source).take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() < len {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(bytes)
    }

    /// Reads a string written by [`Encoder::write_string`].
    pub fn read_string(&mut self) -> CodecResult<String> {
        Ok(self.read_shared_string()?.to_string())
    }

    /// Reads a string, sharing the allocation with earlier occurrences.
    pub fn read_shared_string(&mut self) -> CodecResult<Arc<str>> {
        if self.strings.is_none() {
            let value: String = self.take()?;
            return Ok(Arc::from(value));
        }
        let index: u32 = self.take()?;
        if index == 0 {
            let value: String = self.take()?;
            let value: Arc<str> = Arc::from(value);
            if let Some(strings) = &mut self.strings {
                strings.push(Arc::clone(&value));
            }
            return Ok(value);
        }
        self.strings
            .as_ref()
            .and_then(|strings| strings.get(index as usize - 1))
            .cloned()
            .ok_or_else(|| CodecError::malformed(format!("unknown string reference {index}")))
    }

    /// Reads an optional string.
    pub fn read_optional_string(&mut self) -> CodecResult<Option<String>> {
        if self.read_bool()? {
            self.read_string().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads a content hash.
    pub fn read_hash(&mut self) -> CodecResult<ContentHash> {
        Ok(ContentHash::from_raw(self.take()?))
    }

    /// Reads a `serde` value written by [`Encoder::write_serde`].
    pub fn read_serde<T: DeserializeOwned>(&mut self) -> CodecResult<T> {
        bincode::serde::decode_from_std_read(&mut self.source, config()).map_err(decode_error)
    }
}

/// A cloneable in-memory sink, readable after the encoder that owns a clone
/// has been dropped or flushed.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the bytes written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Returns `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

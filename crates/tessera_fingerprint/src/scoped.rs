//! A thread-safe, framed writer for one fingerprint stream.

use crate::error::{FingerprintError, FingerprintResult};
use parking_lot::Mutex;
use tessera_diagnostics::PropertyTrace;
use tessera_graph::{Codec, WriteContext};

/// Frame tag preceding every record.
pub(crate) const FRAME_RECORD: u8 = 1;
/// Frame tag terminating a stream.
pub(crate) const FRAME_END: u8 = 0;

struct State {
    ctx: WriteContext,
    records: usize,
    closed: bool,
}

/// Serializes records of type `T` to a single stream.
///
/// Writes from any number of threads are serialized by an internal lock so
/// records never interleave. Each record is written under the property trace
/// given by the caller, which locates problems raised while encoding nested
/// values.
pub struct ScopedFingerprintWriter<T> {
    state: Mutex<State>,
    codec: Box<dyn Codec<T>>,
}

impl<T> ScopedFingerprintWriter<T> {
    /// Creates a writer appending to `ctx` with `codec`.
    pub fn new(ctx: WriteContext, codec: impl Codec<T> + 'static) -> Self {
        Self {
            state: Mutex::new(State {
                ctx,
                records: 0,
                closed: false,
            }),
            codec: Box::new(codec),
        }
    }

    /// Appends `record`, encoded under `trace` (the runtime trace if `None`).
    pub fn write(&self, record: &T, trace: Option<PropertyTrace>) -> FingerprintResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(FingerprintError::Closed);
        }
        let trace = trace.unwrap_or(PropertyTrace::Runtime);
        let codec = &self.codec;
        state.ctx.with_property_trace(trace, |ctx| {
            ctx.write_u8(FRAME_RECORD)?;
            codec.encode(ctx, record)
        })?;
        state.records += 1;
        Ok(())
    }

    /// Returns the number of records written so far.
    pub fn records(&self) -> usize {
        self.state.lock().records
    }

    /// Returns `true` once [`close`](Self::close) has completed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Writes the end marker and flushes. Later calls do nothing.
    pub fn close(&self) -> FingerprintResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.ctx.write_u8(FRAME_END)?;
        state.ctx.flush()?;
        Ok(())
    }
}

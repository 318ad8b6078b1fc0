//! Write and read contexts carried through every codec call.

use crate::bindings::Bindings;
use crate::encoding::{Decoder, Encoder};
use crate::error::{CodecError, CodecResult};
use crate::identity::{ReadIdentities, WriteIdentities, TAG_NEW, TAG_REF};
use crate::object::{downcast, type_name_of, ObjectRef, Value};
use std::any::Any;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tessera_config::CacheOptions;
use tessera_diagnostics::{
    DiagnosticCode, DocumentationSection, Problem, ProblemReporter, PropertyTrace,
    StructuredMessage,
};
use tracing::debug;

/// Binding tag written for null values.
const TAG_NULL: u32 = 0;

/// Stream-level settings shared by the write and read side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecSettings {
    /// Nesting depth past which object payloads are queued instead of
    /// written recursively.
    pub max_nesting_depth: usize,
    /// Whether repeated strings are written as back references.
    pub deduplicate_strings: bool,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            max_nesting_depth: 64,
            deduplicate_strings: true,
        }
    }
}

impl From<&CacheOptions> for CodecSettings {
    fn from(options: &CacheOptions) -> Self {
        Self {
            max_nesting_depth: options.max_nesting_depth,
            deduplicate_strings: options.deduplicate_strings,
        }
    }
}

impl CodecSettings {
    /// Creates a write context over `sink`.
    pub fn writer(
        &self,
        sink: impl Write + Send + 'static,
        bindings: Arc<Bindings>,
        reporter: Arc<dyn ProblemReporter>,
    ) -> WriteContext {
        let encoder = Encoder::new(sink).with_string_deduplication(self.deduplicate_strings);
        WriteContext::new(encoder, bindings, reporter).with_max_nesting_depth(self.max_nesting_depth)
    }

    /// Creates a read context over `source`.
    pub fn reader(
        &self,
        source: impl Read + Send + 'static,
        bindings: Arc<Bindings>,
        reporter: Arc<dyn ProblemReporter>,
    ) -> ReadContext {
        let decoder = Decoder::new(source).with_string_deduplication(self.deduplicate_strings);
        ReadContext::new(decoder, bindings, reporter).with_max_nesting_depth(self.max_nesting_depth)
    }
}

/// Work queued by [`WriteContext::nested`] or [`ReadContext::nested`].
pub type Deferred<C> = Box<dyn FnOnce(&mut C) -> CodecResult<()> + Send>;

struct Nesting<C> {
    depth: usize,
    max_depth: usize,
    draining: bool,
    pending: VecDeque<Deferred<C>>,
}

impl<C> Nesting<C> {
    fn new(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth: max_depth.max(1),
            draining: false,
            pending: VecDeque::new(),
        }
    }
}

trait Reentrant: Sized {
    fn nesting(&mut self) -> &mut Nesting<Self>;
}

// Runs `payload` now, or queues it when the nesting limit is reached. The
// queue is drained in FIFO order once the outermost payload returns, which
// keeps the write and read side in the same order.
fn run_nested<C: Reentrant>(ctx: &mut C, payload: Deferred<C>) -> CodecResult<()> {
    let nesting = ctx.nesting();
    if nesting.depth >= nesting.max_depth {
        nesting.pending.push_back(payload);
        return Ok(());
    }
    nesting.depth += 1;
    let result = payload(ctx);
    ctx.nesting().depth -= 1;
    result?;

    let nesting = ctx.nesting();
    if nesting.depth > 0 || nesting.draining {
        return Ok(());
    }
    nesting.draining = true;
    let result = drain(ctx);
    ctx.nesting().draining = false;
    result
}

fn drain<C: Reentrant>(ctx: &mut C) -> CodecResult<()> {
    while let Some(next) = ctx.nesting().pending.pop_front() {
        ctx.nesting().depth += 1;
        let result = next(ctx);
        ctx.nesting().depth -= 1;
        result?;
    }
    Ok(())
}

/// State of an encoding pass.
///
/// Dereferences to the underlying [`Encoder`] for primitive writes.
pub struct WriteContext {
    encoder: Encoder,
    bindings: Arc<Bindings>,
    identities: WriteIdentities,
    trace: PropertyTrace,
    reporter: Arc<dyn ProblemReporter>,
    nesting: Nesting<WriteContext>,
}

impl Reentrant for WriteContext {
    fn nesting(&mut self) -> &mut Nesting<Self> {
        &mut self.nesting
    }
}

impl WriteContext {
    /// Creates a context writing through `encoder`.
    pub fn new(encoder: Encoder, bindings: Arc<Bindings>, reporter: Arc<dyn ProblemReporter>) -> Self {
        Self {
            encoder,
            bindings,
            identities: WriteIdentities::default(),
            trace: PropertyTrace::Unknown,
            reporter,
            nesting: Nesting::new(CodecSettings::default().max_nesting_depth),
        }
    }

    /// Sets the nesting depth past which payloads are queued.
    pub fn with_max_nesting_depth(mut self, max_depth: usize) -> Self {
        self.nesting = Nesting::new(max_depth);
        self
    }

    /// Writes a nullable graph value.
    ///
    /// A value no binding accepts is reported as a problem against the
    /// current trace and written as null.
    pub fn write_value(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Some(obj) => self.write_object(obj),
            None => self.encoder.write_u32(TAG_NULL),
        }
    }

    /// Writes a non-null graph value.
    pub fn write_object(&mut self, obj: &ObjectRef) -> CodecResult<()> {
        let bindings = Arc::clone(&self.bindings);
        match bindings.find(obj) {
            Some(binding) => {
                self.encoder.write_u32(binding.tag())?;
                binding.codec().encode(self, obj)
            }
            None => {
                self.report_unsupported_type(obj);
                self.encoder.write_u32(TAG_NULL)
            }
        }
    }

    fn report_unsupported_type(&self, obj: &ObjectRef) {
        let type_name = type_name_of(obj);
        debug!(type_name, trace = %self.trace, "no codec for value, writing null");
        let message = StructuredMessage::new()
            .text("cannot serialize object of type ")
            .reference(type_name)
            .text(", as these are not supported with the configuration cache.");
        self.reporter.report_problem(
            Problem::error(DiagnosticCode::UNSUPPORTED_TYPE, self.trace.clone(), message)
                .with_documentation(DocumentationSection::RequirementsDisallowedTypes),
        );
    }

    /// Writes `obj` once per stream.
    ///
    /// The first time `obj` is seen a fresh id is assigned and `payload` is
    /// run; afterwards only a back reference is written.
    pub fn encode_preserving_identity(
        &mut self,
        obj: &ObjectRef,
        payload: impl FnOnce(&mut Self) -> CodecResult<()>,
    ) -> CodecResult<()> {
        match self.identities.get_id(obj) {
            Some(id) => {
                self.encoder.write_u8(TAG_REF)?;
                self.encoder.write_u32(id)
            }
            None => {
                self.identities.put_instance(obj);
                self.encoder.write_u8(TAG_NEW)?;
                payload(self)
            }
        }
    }

    /// Runs `payload` now, or queues it if the nesting limit is reached.
    ///
    /// Queued payloads run in order once the outermost payload returns.
    /// The read side must call [`ReadContext::nested`] at the same points.
    pub fn nested(&mut self, payload: Deferred<Self>) -> CodecResult<()> {
        run_nested(self, payload)
    }

    /// Returns the current property trace.
    pub fn trace(&self) -> &PropertyTrace {
        &self.trace
    }

    /// Runs `f` with `trace` as the current property trace.
    pub fn with_property_trace<R>(
        &mut self,
        trace: PropertyTrace,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = std::mem::replace(&mut self.trace, trace);
        let result = f(self);
        self.trace = previous;
        result
    }

    /// Returns the problem reporter of this pass.
    pub fn reporter(&self) -> &Arc<dyn ProblemReporter> {
        &self.reporter
    }

    /// Returns the number of distinct objects written so far.
    pub fn object_count(&self) -> usize {
        self.identities.len()
    }

    /// Flushes the underlying stream.
    pub fn flush(&mut self) -> CodecResult<()> {
        self.encoder.flush()
    }
}

impl Deref for WriteContext {
    type Target = Encoder;

    fn deref(&self) -> &Encoder {
        &self.encoder
    }
}

impl DerefMut for WriteContext {
    fn deref_mut(&mut self) -> &mut Encoder {
        &mut self.encoder
    }
}

/// State of a decoding pass.
///
/// Dereferences to the underlying [`Decoder`] for primitive reads.
pub struct ReadContext {
    decoder: Decoder,
    bindings: Arc<Bindings>,
    identities: ReadIdentities,
    trace: PropertyTrace,
    reporter: Arc<dyn ProblemReporter>,
    nesting: Nesting<ReadContext>,
}

impl Reentrant for ReadContext {
    fn nesting(&mut self) -> &mut Nesting<Self> {
        &mut self.nesting
    }
}

impl ReadContext {
    /// Creates a context reading through `decoder`.
    pub fn new(decoder: Decoder, bindings: Arc<Bindings>, reporter: Arc<dyn ProblemReporter>) -> Self {
        Self {
            decoder,
            bindings,
            identities: ReadIdentities::default(),
            trace: PropertyTrace::Unknown,
            reporter,
            nesting: Nesting::new(CodecSettings::default().max_nesting_depth),
        }
    }

    /// Sets the nesting depth past which payloads are queued.
    pub fn with_max_nesting_depth(mut self, max_depth: usize) -> Self {
        self.nesting = Nesting::new(max_depth);
        self
    }

    /// Reads a nullable graph value.
    pub fn read_value(&mut self) -> CodecResult<Value> {
        let tag = self.decoder.read_u32()?;
        if tag == TAG_NULL {
            return Ok(None);
        }
        let bindings = Arc::clone(&self.bindings);
        let binding = bindings.by_tag(tag).ok_or(CodecError::UnknownBinding(tag))?;
        binding.codec().decode(self).map(Some)
    }

    /// Reads a graph value that must not be null.
    pub fn read_object(&mut self) -> CodecResult<ObjectRef> {
        self.read_value()?
            .ok_or(CodecError::UnexpectedNull { expected: "object" })
    }

    /// Reads a nullable graph value of type `T`.
    pub fn read_value_as<T: Any + Send + Sync>(&mut self) -> CodecResult<Option<Arc<T>>> {
        match self.read_value()? {
            Some(obj) => expect_type::<T>(&obj).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a non-null graph value of type `T`.
    pub fn read_object_as<T: Any + Send + Sync>(&mut self) -> CodecResult<Arc<T>> {
        let value = self.read_value()?.ok_or(CodecError::UnexpectedNull {
            expected: std::any::type_name::<T>(),
        })?;
        expect_type::<T>(&value)
    }

    /// Reads an object written by [`WriteContext::encode_preserving_identity`].
    ///
    /// `payload` receives the id reserved for the object and may call
    /// [`ReadContext::register`] before decoding nested values, so cycles
    /// back to the object resolve. The object it returns replaces whatever
    /// was registered.
    pub fn decode_preserving_identity(
        &mut self,
        payload: impl FnOnce(&mut Self, u32) -> CodecResult<ObjectRef>,
    ) -> CodecResult<ObjectRef> {
        match self.decoder.read_u8()? {
            TAG_REF => {
                let id = self.decoder.read_u32()?;
                self.identities.get_instance(id)
            }
            TAG_NEW => {
                let id = self.identities.reserve();
                let obj = payload(self, id)?;
                self.identities.put_instance(id, ObjectRef::clone(&obj));
                Ok(obj)
            }
            tag => Err(CodecError::malformed(format!("invalid identity tag {tag}"))),
        }
    }

    /// Typed variant of [`ReadContext::decode_preserving_identity`].
    pub fn decode_preserving_identity_as<T: Any + Send + Sync>(
        &mut self,
        payload: impl FnOnce(&mut Self, u32) -> CodecResult<Arc<T>>,
    ) -> CodecResult<Arc<T>> {
        let obj = self.decode_preserving_identity(|ctx, id| {
            let typed: ObjectRef = payload(ctx, id)?;
            Ok(typed)
        })?;
        expect_type::<T>(&obj)
    }

    /// Makes `obj` the target of back references to `id`.
    pub fn register(&mut self, id: u32, obj: ObjectRef) {
        self.identities.put_instance(id, obj);
    }

    /// Runs `payload` now, or queues it if the nesting limit is reached.
    pub fn nested(&mut self, payload: Deferred<Self>) -> CodecResult<()> {
        run_nested(self, payload)
    }

    /// Returns the current property trace.
    pub fn trace(&self) -> &PropertyTrace {
        &self.trace
    }

    /// Runs `f` with `trace` as the current property trace.
    pub fn with_property_trace<R>(
        &mut self,
        trace: PropertyTrace,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = std::mem::replace(&mut self.trace, trace);
        let result = f(self);
        self.trace = previous;
        result
    }

    /// Returns the problem reporter of this pass.
    pub fn reporter(&self) -> &Arc<dyn ProblemReporter> {
        &self.reporter
    }
}

impl Deref for ReadContext {
    type Target = Decoder;

    fn deref(&self) -> &Decoder {
        &self.decoder
    }
}

impl DerefMut for ReadContext {
    fn deref_mut(&mut self) -> &mut Decoder {
        &mut self.decoder
    }
}

fn expect_type<T: Any + Send + Sync>(obj: &ObjectRef) -> CodecResult<Arc<T>> {
    downcast::<T>(obj).ok_or_else(|| CodecError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        found: type_name_of(obj).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::SharedBuffer;
    use std::io::Cursor;
    use tessera_diagnostics::ProblemSink;

    fn contexts(max_depth: usize) -> (WriteContext, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let settings = CodecSettings {
            max_nesting_depth: max_depth,
            ..CodecSettings::default()
        };
        let ctx = settings.writer(
            buffer.clone(),
            Bindings::builder().build(),
            Arc::new(ProblemSink::new()),
        );
        (ctx, buffer)
    }

    fn reader(buffer: &SharedBuffer, max_depth: usize) -> ReadContext {
        let settings = CodecSettings {
            max_nesting_depth: max_depth,
            ..CodecSettings::default()
        };
        settings.reader(
            Cursor::new(buffer.bytes()),
            Bindings::builder().build(),
            Arc::new(ProblemSink::new()),
        )
    }

    fn write_chain(ctx: &mut WriteContext, remaining: u32) -> CodecResult<()> {
        ctx.write_u32(remaining)?;
        if remaining == 0 {
            return Ok(());
        }
        ctx.nested(Box::new(move |ctx: &mut WriteContext| {
            write_chain(ctx, remaining - 1)
        }))
    }

    fn read_chain(
        ctx: &mut ReadContext,
        seen: Arc<parking_lot::Mutex<Vec<u32>>>,
    ) -> CodecResult<()> {
        let value = ctx.read_u32()?;
        seen.lock().push(value);
        if value == 0 {
            return Ok(());
        }
        ctx.nested(Box::new(move |ctx: &mut ReadContext| read_chain(ctx, seen)))
    }

    #[test]
    fn nesting_past_the_limit_is_queued_in_order() {
        let (mut ctx, buffer) = contexts(4);
        ctx.nested(Box::new(|ctx: &mut WriteContext| write_chain(ctx, 100)))
            .unwrap();
        ctx.flush().unwrap();

        let mut ctx = reader(&buffer, 4);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ctx.nested(Box::new(move |ctx: &mut ReadContext| read_chain(ctx, sink)))
            .unwrap();
        let expected: Vec<u32> = (0..=100).rev().collect();
        assert_eq!(*seen.lock(), expected);
    }

    #[test]
    fn trace_is_restored() {
        let (mut ctx, _) = contexts(8);
        let inner = ctx.with_property_trace(PropertyTrace::Runtime, |ctx| ctx.trace().clone());
        assert_eq!(inner, PropertyTrace::Runtime);
        assert_eq!(*ctx.trace(), PropertyTrace::Unknown);
    }

    #[test]
    fn unbound_value_is_reported_and_written_as_null() {
        let buffer = SharedBuffer::new();
        let sink = Arc::new(ProblemSink::new());
        let mut ctx = CodecSettings::default().writer(
            buffer.clone(),
            Bindings::builder().build(),
            sink.clone(),
        );
        ctx.with_property_trace(PropertyTrace::Runtime.field("thread"), |ctx| {
            ctx.write_value(&crate::object::value(std::time::Duration::from_secs(1)))
        })
        .unwrap();

        let problems = sink.problems();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].code, DiagnosticCode::UNSUPPORTED_TYPE);
        assert_eq!(problems[0].trace, PropertyTrace::Runtime.field("thread"));
        assert_eq!(
            problems[0].documentation,
            Some(DocumentationSection::RequirementsDisallowedTypes)
        );
        assert!(reader(&buffer, 8).read_value().unwrap().is_none());
    }

    #[test]
    fn unknown_binding_tag_fails() {
        let buffer = SharedBuffer::new();
        Encoder::new(buffer.clone()).write_u32(9).unwrap();
        assert!(matches!(
            reader(&buffer, 8).read_value(),
            Err(CodecError::UnknownBinding(9))
        ));
    }
}

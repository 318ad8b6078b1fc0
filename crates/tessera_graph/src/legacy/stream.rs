use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};
use crate::object::Value;
use std::any::Any;
use std::sync::Arc;
use tessera_diagnostics::{
    DiagnosticCode, Problem, ProblemReporter, PropertyTrace, StructuredMessage,
};

type DefaultWriter<'a> = &'a dyn Fn(&mut WriteContext) -> CodecResult<()>;
type DefaultReader<'a> = &'a dyn Fn(&mut ReadContext) -> CodecResult<()>;

/// The stream handed to `writeObject` and `writeExternal` hooks.
pub struct ObjectOutput<'a> {
    ctx: &'a mut WriteContext,
    class: &'static str,
    defaults: Option<DefaultWriter<'a>>,
    defaults_written: bool,
}

impl<'a> ObjectOutput<'a> {
    pub(crate) fn for_level(
        ctx: &'a mut WriteContext,
        class: &'static str,
        defaults: DefaultWriter<'a>,
    ) -> Self {
        Self {
            ctx,
            class,
            defaults: Some(defaults),
            defaults_written: false,
        }
    }

    pub(crate) fn external(ctx: &'a mut WriteContext, class: &'static str) -> Self {
        Self {
            ctx,
            class,
            defaults: None,
            defaults_written: false,
        }
    }

    /// Writes the default fields of the current class level. At most once.
    pub fn default_write_object(&mut self) -> CodecResult<()> {
        let defaults = self.defaults.ok_or_else(|| CodecError::Protocol {
            class: self.class.to_string(),
            reason: "defaultWriteObject called outside of writeObject".to_string(),
        })?;
        if self.defaults_written {
            return Err(CodecError::Protocol {
                class: self.class.to_string(),
                reason: "defaultWriteObject called more than once".to_string(),
            });
        }
        self.defaults_written = true;
        defaults(self.ctx)
    }

    /// Writes a boolean.
    pub fn write_boolean(&mut self, value: bool) -> CodecResult<()> {
        self.ctx.write_bool(value)
    }

    /// Writes an `int`.
    pub fn write_int(&mut self, value: i32) -> CodecResult<()> {
        self.ctx.write_i32(value)
    }

    /// Writes a `long`.
    pub fn write_long(&mut self, value: i64) -> CodecResult<()> {
        self.ctx.write_i64(value)
    }

    /// Writes a `double`.
    pub fn write_double(&mut self, value: f64) -> CodecResult<()> {
        self.ctx.write_f64(value)
    }

    /// Writes a string.
    pub fn write_utf(&mut self, value: &str) -> CodecResult<()> {
        self.ctx.write_string(value)
    }

    /// Writes a graph value, preserving identity with the rest of the stream.
    pub fn write_object(&mut self, value: &Value) -> CodecResult<()> {
        self.ctx.write_value(value)
    }

    /// Not supported.
    pub fn write_unshared(&mut self, _value: &Value) -> CodecResult<()> {
        Err(self.unsupported("ObjectOutputStream.writeUnshared"))
    }

    /// Not supported.
    pub fn put_fields(&mut self) -> CodecResult<()> {
        Err(self.unsupported("ObjectOutputStream.putFields"))
    }

    /// Not supported.
    pub fn write_fields(&mut self) -> CodecResult<()> {
        Err(self.unsupported("ObjectOutputStream.writeFields"))
    }

    /// Not supported.
    pub fn reset(&mut self) -> CodecResult<()> {
        Err(self.unsupported("ObjectOutputStream.reset"))
    }

    fn unsupported(&self, feature: &'static str) -> CodecError {
        report_unsupported(self.ctx.reporter().as_ref(), self.ctx.trace(), feature, self.class)
    }
}

/// The stream handed to `readObject` and `readExternal` hooks.
pub struct ObjectInput<'a> {
    ctx: &'a mut ReadContext,
    class: &'static str,
    defaults: Option<DefaultReader<'a>>,
    defaults_read: bool,
}

impl<'a> ObjectInput<'a> {
    pub(crate) fn for_level(
        ctx: &'a mut ReadContext,
        class: &'static str,
        defaults: DefaultReader<'a>,
    ) -> Self {
        Self {
            ctx,
            class,
            defaults: Some(defaults),
            defaults_read: false,
        }
    }

    pub(crate) fn external(ctx: &'a mut ReadContext, class: &'static str) -> Self {
        Self {
            ctx,
            class,
            defaults: None,
            defaults_read: false,
        }
    }

    /// Reads the default fields of the current class level. At most once.
    pub fn default_read_object(&mut self) -> CodecResult<()> {
        let defaults = self.defaults.ok_or_else(|| CodecError::Protocol {
            class: self.class.to_string(),
            reason: "defaultReadObject called outside of readObject".to_string(),
        })?;
        if self.defaults_read {
            return Err(CodecError::Protocol {
                class: self.class.to_string(),
                reason: "defaultReadObject called more than once".to_string(),
            });
        }
        self.defaults_read = true;
        defaults(self.ctx)
    }

    /// Reads a boolean.
    pub fn read_boolean(&mut self) -> CodecResult<bool> {
        self.ctx.read_bool()
    }

    /// Reads an `int`.
    pub fn read_int(&mut self) -> CodecResult<i32> {
        self.ctx.read_i32()
    }

    /// Reads a `long`.
    pub fn read_long(&mut self) -> CodecResult<i64> {
        self.ctx.read_i64()
    }

    /// Reads a `double`.
    pub fn read_double(&mut self) -> CodecResult<f64> {
        self.ctx.read_f64()
    }

    /// Reads a string.
    pub fn read_utf(&mut self) -> CodecResult<String> {
        self.ctx.read_string()
    }

    /// Reads a graph value.
    pub fn read_object(&mut self) -> CodecResult<Value> {
        self.ctx.read_value()
    }

    /// Reads a graph value of type `T`.
    pub fn read_object_as<T: Any + Send + Sync>(&mut self) -> CodecResult<Option<Arc<T>>> {
        self.ctx.read_value_as::<T>()
    }

    /// Not supported.
    pub fn read_unshared(&mut self) -> CodecResult<Value> {
        Err(self.unsupported("ObjectInputStream.readUnshared"))
    }

    /// Not supported.
    pub fn read_fields(&mut self) -> CodecResult<()> {
        Err(self.unsupported("ObjectInputStream.readFields"))
    }

    /// Not supported.
    pub fn register_validation(&mut self) -> CodecResult<()> {
        Err(self.unsupported("ObjectInputStream.registerValidation"))
    }

    fn unsupported(&self, feature: &'static str) -> CodecError {
        report_unsupported(self.ctx.reporter().as_ref(), self.ctx.trace(), feature, self.class)
    }
}

fn report_unsupported(
    reporter: &dyn ProblemReporter,
    trace: &PropertyTrace,
    feature: &'static str,
    class: &'static str,
) -> CodecError {
    let error = CodecError::UnsupportedFeature {
        feature,
        class: class.to_string(),
    };
    let message = StructuredMessage::new()
        .text("serialization feature ")
        .reference(feature)
        .text(" used by ")
        .reference(class)
        .text(" is not supported with the configuration cache.");
    reporter.report_problem(
        Problem::error(
            DiagnosticCode::UNSUPPORTED_SERIALIZATION_FEATURE,
            trace.clone(),
            message,
        )
        .with_optional_documentation(error.documentation()),
    );
    error
}

//! Suppliers and functions whose evaluation is postponed until invocation.
//!
//! A deferred value is a named body plus the values it captured. Encoding
//! writes the name and the captures; decoding looks the body up by name.
//! Neither side runs the body, so anything the body reads from its
//! environment is read when the decoded value is invoked.

use crate::codec::Codec;
use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};
use crate::object::{ObjectRef, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Body of a [`Supplier`].
pub type SupplierBody = fn(&[Value]) -> Value;

/// Body of a [`Function`].
pub type FunctionBody = fn(&[Value], Value) -> Value;

/// A zero-argument computation.
pub struct Supplier {
    name: String,
    captures: Vec<Value>,
    body: SupplierBody,
}

impl Supplier {
    pub(crate) fn new(name: impl Into<String>, captures: Vec<Value>, body: SupplierBody) -> Self {
        Self {
            name: name.into(),
            captures,
            body,
        }
    }

    /// Returns the registered name of the body.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the captured values.
    pub fn captures(&self) -> &[Value] {
        &self.captures
    }

    /// Runs the computation.
    pub fn get(&self) -> Value {
        (self.body)(&self.captures)
    }
}

impl fmt::Debug for Supplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supplier").field("name", &self.name).finish()
    }
}

/// A one-argument computation.
pub struct Function {
    name: String,
    captures: Vec<Value>,
    body: FunctionBody,
}

impl Function {
    pub(crate) fn new(name: impl Into<String>, captures: Vec<Value>, body: FunctionBody) -> Self {
        Self {
            name: name.into(),
            captures,
            body,
        }
    }

    /// Returns the registered name of the body.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the captured values.
    pub fn captures(&self) -> &[Value] {
        &self.captures
    }

    /// Runs the computation on `argument`.
    pub fn apply(&self, argument: Value) -> Value {
        (self.body)(&self.captures, argument)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).finish()
    }
}

/// Named bodies available when decoding deferred values.
#[derive(Default)]
pub struct LambdaRegistry {
    suppliers: HashMap<String, SupplierBody>,
    functions: HashMap<String, FunctionBody>,
}

impl LambdaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a supplier body.
    pub fn with_supplier(mut self, name: impl Into<String>, body: SupplierBody) -> Self {
        self.suppliers.insert(name.into(), body);
        self
    }

    /// Registers a function body.
    pub fn with_function(mut self, name: impl Into<String>, body: FunctionBody) -> Self {
        self.functions.insert(name.into(), body);
        self
    }

    /// Looks up a supplier body.
    pub fn supplier(&self, name: &str) -> Option<SupplierBody> {
        self.suppliers.get(name).copied()
    }

    /// Looks up a function body.
    pub fn function(&self, name: &str) -> Option<FunctionBody> {
        self.functions.get(name).copied()
    }

    /// Creates a supplier running the body registered as `name` over `captures`.
    ///
    /// Fails if no supplier body is registered under `name`, so a supplier
    /// always encodes under the name its body is decoded from.
    pub fn make_supplier(&self, name: &str, captures: Vec<Value>) -> CodecResult<Supplier> {
        let body = self.supplier(name).ok_or_else(|| CodecError::Unknown {
            kind: "supplier",
            name: name.to_string(),
        })?;
        Ok(Supplier::new(name, captures, body))
    }

    /// Creates a function running the body registered as `name` over
    /// `captures` and its argument.
    pub fn make_function(&self, name: &str, captures: Vec<Value>) -> CodecResult<Function> {
        let body = self.function(name).ok_or_else(|| CodecError::Unknown {
            kind: "function",
            name: name.to_string(),
        })?;
        Ok(Function::new(name, captures, body))
    }
}

fn write_captures(ctx: &mut WriteContext, captures: &[Value]) -> CodecResult<()> {
    ctx.write_len(captures.len())?;
    captures.iter().try_for_each(|capture| ctx.write_value(capture))
}

fn read_captures(ctx: &mut ReadContext) -> CodecResult<Vec<Value>> {
    let len = ctx.read_len()?;
    (0..len).map(|_| ctx.read_value()).collect()
}

/// Codec for [`Supplier`].
pub struct SupplierCodec {
    lambdas: Arc<LambdaRegistry>,
}

impl SupplierCodec {
    /// Creates a codec resolving bodies in `lambdas`.
    pub fn new(lambdas: Arc<LambdaRegistry>) -> Self {
        Self { lambdas }
    }
}

impl Codec<Arc<Supplier>> for SupplierCodec {
    fn encode(&self, ctx: &mut WriteContext, value: &Arc<Supplier>) -> CodecResult<()> {
        let obj: ObjectRef = value.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_string(&value.name)?;
            write_captures(ctx, &value.captures)
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<Supplier>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let name = ctx.read_string()?;
            let body = self.lambdas.supplier(&name).ok_or_else(|| CodecError::Unknown {
                kind: "supplier",
                name: name.clone(),
            })?;
            Ok(Arc::new(Supplier::new(name, read_captures(ctx)?, body)))
        })
    }
}

/// Codec for [`Function`].
pub struct FunctionCodec {
    lambdas: Arc<LambdaRegistry>,
}

impl FunctionCodec {
    /// Creates a codec resolving bodies in `lambdas`.
    pub fn new(lambdas: Arc<LambdaRegistry>) -> Self {
        Self { lambdas }
    }
}

impl Codec<Arc<Function>> for FunctionCodec {
    fn encode(&self, ctx: &mut WriteContext, value: &Arc<Function>) -> CodecResult<()> {
        let obj: ObjectRef = value.clone();
        ctx.encode_preserving_identity(&obj, |ctx| {
            ctx.write_string(&value.name)?;
            write_captures(ctx, &value.captures)
        })
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<Arc<Function>> {
        ctx.decode_preserving_identity_as(|ctx, _| {
            let name = ctx.read_string()?;
            let body = self.lambdas.function(&name).ok_or_else(|| CodecError::Unknown {
                kind: "function",
                name: name.clone(),
            })?;
            Ok(Arc::new(Function::new(name, read_captures(ctx)?, body)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{downcast_ref, value};

    fn concat(captures: &[Value], argument: Value) -> Value {
        let prefix = captures[0].as_ref().and_then(downcast_ref::<String>).cloned();
        let suffix = argument.as_ref().and_then(downcast_ref::<String>).cloned();
        value(format!("{}{}", prefix.unwrap_or_default(), suffix.unwrap_or_default()))
    }

    #[test]
    fn function_applies_captures() {
        let function = Function::new("concat", vec![value("a-".to_string())], concat);
        let result = function.apply(value("b".to_string()));
        assert_eq!(
            result.as_ref().and_then(downcast_ref::<String>).map(String::as_str),
            Some("a-b")
        );
    }

    #[test]
    fn made_values_carry_the_registered_body() {
        let lambdas = LambdaRegistry::new().with_function("concat", concat);
        let function = lambdas
            .make_function("concat", vec![value("x".to_string())])
            .unwrap();
        assert_eq!(function.name(), "concat");
        assert_eq!(
            function
                .apply(value("y".to_string()))
                .as_ref()
                .and_then(downcast_ref::<String>)
                .map(String::as_str),
            Some("xy")
        );
        assert!(matches!(
            lambdas.make_supplier("concat", Vec::new()),
            Err(CodecError::Unknown { kind: "supplier", .. })
        ));
    }

    #[test]
    fn registry_lookup() {
        let lambdas = LambdaRegistry::new().with_function("concat", concat);
        assert!(lambdas.function("concat").is_some());
        assert!(lambdas.supplier("concat").is_none());
    }
}

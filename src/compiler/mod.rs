//! # Serializer Compilers
//!
//! A compile function turns one response schema into a [`SerializeFn`]. It is
//! invoked once per (route, status selector, content type) during the ready
//! pass and the result is cached by
//! [`SerializerCache`](crate::serializer_cache::SerializerCache).
//!
//! Compile functions are bound to scopes and inherited by child scopes; a
//! route may carry its own, which wins over every scope binding. When nothing
//! is bound the [`DefaultCompiler`] is used.
//!
//! Any `Fn(&CompileContext) -> Result<SerializeFn, BoxError>` closure is a
//! [`SerializerCompiler`]:
//!
//! ```
//! use brrtserializer::compiler::{serializer, CompileContext, Payload, SerializeFn};
//! use brrtserializer::error::BoxError;
//!
//! let compile = |ctx: &CompileContext<'_>| -> Result<SerializeFn, BoxError> {
//!     let status = ctx.http_status.to_string();
//!     Ok(serializer(move |value| Ok(Payload::Text(format!("{status}:{value}")))))
//! };
//! # let _ = compile;
//! ```

mod default;
mod plan;

pub use default::DefaultCompiler;

use crate::error::{BoxError, SerializeError};
use crate::schema::{SchemaDocument, SchemaSet};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Output of a compiled serializer.
///
/// Only `Text` and `Binary` may reach the wire; a `Value` is rejected by the
/// reply pipeline as an invalid payload type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
    Value(Value),
}

impl Payload {
    pub fn is_sendable(&self) -> bool {
        !matches!(self, Payload::Value(_))
    }

    /// Runtime type name reported for invalid payloads.
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Text(_) => "string",
            Payload::Binary(_) => "binary",
            Payload::Value(value) => json_type_name(value),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Text(text) => Some(text.as_bytes()),
            Payload::Binary(bytes) => Some(bytes),
            Payload::Value(_) => None,
        }
    }

    /// Lossy text view, used by the CLI and in tests.
    pub fn to_text(&self) -> String {
        match self {
            Payload::Text(text) => text.clone(),
            Payload::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Payload::Value(value) => value.to_string(),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A compiled serializer: value in, wire payload out.
pub type SerializeFn = Arc<dyn Fn(&Value) -> Result<Payload, SerializeError> + Send + Sync>;

/// Wrap a closure as a [`SerializeFn`].
pub fn serializer<F>(f: F) -> SerializeFn
where
    F: Fn(&Value) -> Result<Payload, SerializeError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Everything a compile function gets to see.
pub struct CompileContext<'a> {
    /// The schema as declared on the route, untouched.
    pub schema: &'a Value,
    pub method: &'a str,
    /// Route pattern including any scope prefix, e.g. `/foo/:id`.
    pub url: &'a str,
    /// `200`, `2xx` or `default`.
    pub http_status: &'a str,
    /// Declared content type key, `None` for a plain schema.
    pub content_type: Option<&'a str>,
    /// Shared schemas visible from the route's scope.
    pub schemas: &'a SchemaSet,
    /// `schema` wrapped as a document, used as the base for its `$ref`s.
    pub document: &'a Arc<SchemaDocument>,
}

impl fmt::Debug for CompileContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileContext")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("http_status", &self.http_status)
            .field("content_type", &self.content_type)
            .field("generation", &self.schemas.generation())
            .finish()
    }
}

/// Turns a response schema into a serializer.
pub trait SerializerCompiler: Send + Sync {
    fn compile(&self, ctx: &CompileContext<'_>) -> Result<SerializeFn, BoxError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> SerializerCompiler for F
where
    F: Fn(&CompileContext<'_>) -> Result<SerializeFn, BoxError> + Send + Sync,
{
    fn compile(&self, ctx: &CompileContext<'_>) -> Result<SerializeFn, BoxError> {
        self(ctx)
    }
}

pub type SharedCompiler = Arc<dyn SerializerCompiler>;

/// Share a compile closure; the `Fn` bound lets the closure's argument types
/// be inferred.
pub fn compiler<F>(f: F) -> SharedCompiler
where
    F: Fn(&CompileContext<'_>) -> Result<SerializeFn, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// How the default compiler turns fractional numbers into integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rounding {
    #[default]
    Trunc,
    Ceil,
    Floor,
    Round,
}

impl Rounding {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Rounding::Trunc => value.trunc(),
            Rounding::Ceil => value.ceil(),
            Rounding::Floor => value.floor(),
            // half-up, ties go towards +inf
            Rounding::Round => (value + 0.5).floor(),
        }
    }
}

impl FromStr for Rounding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trunc" => Ok(Rounding::Trunc),
            "ceil" => Ok(Rounding::Ceil),
            "floor" => Ok(Rounding::Floor),
            "round" => Ok(Rounding::Round),
            other => Err(format!(
                "invalid rounding '{other}' (expected trunc|ceil|floor|round)"
            )),
        }
    }
}

impl fmt::Display for Rounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rounding::Trunc => "trunc",
            Rounding::Ceil => "ceil",
            Rounding::Floor => "floor",
            Rounding::Round => "round",
        };
        f.write_str(name)
    }
}

/// Options of the built-in compiler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerOptions {
    pub rounding: Rounding,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_type_names() {
        assert_eq!(Payload::Value(json!({"not": "a string"})).type_name(), "object");
        assert_eq!(Payload::Value(json!(3)).type_name(), "number");
        assert_eq!(Payload::from("x").type_name(), "string");
        assert!(!Payload::Value(json!(null)).is_sendable());
        assert!(Payload::from(vec![1u8, 2]).is_sendable());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(Rounding::Trunc.apply(4.7), 4.0);
        assert_eq!(Rounding::Ceil.apply(4.2), 5.0);
        assert_eq!(Rounding::Floor.apply(-4.2), -5.0);
        assert_eq!(Rounding::Round.apply(4.5), 5.0);
        assert_eq!(Rounding::Round.apply(-4.5), -4.0);
        assert_eq!("CEIL".parse::<Rounding>(), Ok(Rounding::Ceil));
        assert!("up".parse::<Rounding>().is_err());
    }

    #[test]
    fn test_closure_is_a_compiler() {
        fn assert_compiler<C: SerializerCompiler>(_: &C) {}
        let compile = |_ctx: &CompileContext<'_>| -> Result<SerializeFn, BoxError> {
            Ok(serializer(|_| Ok(Payload::from("ok"))))
        };
        assert_compiler(&compile);
    }
}

//! # Error Types
//!
//! Every error the engine surfaces carries a stable, machine-readable
//! [`ErrorCode`]. Build-time errors ([`SchemaError`], [`BuildError`]) abort the
//! ready pass; request-time failures ([`SerializeError`]) are recovered by the
//! reply pipeline and never escape it.

use crate::ids::{RouteId, ScopeId};
use std::fmt;
use thiserror::Error;

/// Boxed error returned by user-supplied compile functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stable error codes exposed to callers and embedded in fixed fallback bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SchemaMissingId,
    SchemaAlreadyPresent,
    SchemaRefNotFound,
    ContentMissingSchema,
    SerializationBuild,
    InvalidStatusSelector,
    ValidationBuild,
    InvalidPayloadType,
    FailedErrorSerialization,
    Validation,
    RouteAfterReady,
    UnknownScope,
    UnknownRoute,
    Serialization,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SchemaMissingId => "ERR_SCH_MISSING_ID",
            ErrorCode::SchemaAlreadyPresent => "ERR_SCH_ALREADY_PRESENT",
            ErrorCode::SchemaRefNotFound => "ERR_SCH_REF_NOT_FOUND",
            ErrorCode::ContentMissingSchema => "ERR_SCH_CONTENT_MISSING_SCHEMA",
            ErrorCode::SerializationBuild => "ERR_SCH_SERIALIZATION_BUILD",
            ErrorCode::InvalidStatusSelector => "ERR_SCH_INVALID_STATUS_SELECTOR",
            ErrorCode::ValidationBuild => "ERR_SCH_VALIDATION_BUILD",
            ErrorCode::InvalidPayloadType => "ERR_REP_INVALID_PAYLOAD_TYPE",
            ErrorCode::FailedErrorSerialization => "ERR_FAILED_ERROR_SERIALIZATION",
            ErrorCode::Validation => "ERR_VALIDATION",
            ErrorCode::RouteAfterReady => "ERR_ROUTE_AFTER_READY",
            ErrorCode::UnknownScope => "ERR_UNKNOWN_SCOPE",
            ErrorCode::UnknownRoute => "ERR_UNKNOWN_ROUTE",
            ErrorCode::Serialization => "ERR_SERIALIZATION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the schema store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The document has no `$id`, or an empty one.
    #[error("Missing schema $id property")]
    MissingId,

    /// A document with the same `$id` is already visible from the scope.
    #[error("Schema with id '{id}' already declared!")]
    AlreadyPresent {
        /// The duplicated identifier
        id: String,
    },

    /// A `$ref` does not point at any registered document or fragment.
    #[error("Failed to resolve $ref '{reference}'{}", .base.as_ref().map(|b| format!(" from '{b}'")).unwrap_or_default())]
    RefNotFound {
        /// The reference as written in the schema
        reference: String,
        /// Identifier of the document the reference appears in, if it has one
        base: Option<String>,
    },
}

impl SchemaError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SchemaError::MissingId => ErrorCode::SchemaMissingId,
            SchemaError::AlreadyPresent { .. } => ErrorCode::SchemaAlreadyPresent,
            SchemaError::RefNotFound { .. } => ErrorCode::SchemaRefNotFound,
        }
    }
}

/// Errors raised while preparing a route in the ready pass.
///
/// All of them are fatal to startup: a server must not start serving with a
/// route whose serializers could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A content-type key in a content map has no `schema`.
    #[error("Schema is missing for the content type '{content_type}' ({method} {url})")]
    ContentMissingSchema {
        content_type: String,
        method: String,
        url: String,
    },

    /// A response key is neither a status code, a class pattern nor `default`.
    #[error("Invalid response status selector '{selector}' ({method} {url})")]
    InvalidStatusSelector {
        selector: String,
        method: String,
        url: String,
    },

    /// The active compile function failed for one (status, content type) pair.
    #[error("Failed building the serialization schema for {method}: {url}, due to error {reason}")]
    SerializationBuild {
        method: String,
        url: String,
        http_status: String,
        content_type: Option<String>,
        reason: String,
    },

    /// An input schema could not be compiled into a validator.
    #[error("Failed building the validation schema for {part} of {method}: {url}, due to error {reason}")]
    ValidationBuild {
        part: String,
        method: String,
        url: String,
        reason: String,
    },

    /// The route's scope is not part of the engine's scope tree.
    #[error("Unknown scope {scope} ({method} {url})")]
    UnknownScope {
        scope: ScopeId,
        method: String,
        url: String,
    },

    /// A schema attached to the route failed to resolve.
    #[error("{source} ({method} {url})")]
    Schema {
        method: String,
        url: String,
        source: SchemaError,
    },
}

impl BuildError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BuildError::ContentMissingSchema { .. } => ErrorCode::ContentMissingSchema,
            BuildError::InvalidStatusSelector { .. } => ErrorCode::InvalidStatusSelector,
            BuildError::SerializationBuild { .. } => ErrorCode::SerializationBuild,
            BuildError::ValidationBuild { .. } => ErrorCode::ValidationBuild,
            BuildError::UnknownScope { .. } => ErrorCode::UnknownScope,
            BuildError::Schema { source, .. } => source.code(),
        }
    }

    /// Build errors are server faults.
    pub fn status_code(&self) -> u16 {
        500
    }
}

/// Failure of a compiled serializer while processing one value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SerializeError {
    message: String,
}

impl SerializeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for SerializeError {
    fn from(err: serde_json::Error) -> Self {
        SerializeError::new(err.to_string())
    }
}

/// Top-level error returned by [`Engine`](crate::engine::Engine) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Cannot add route {method} {url}: the engine is already ready")]
    RouteAfterReady { method: String, url: String },

    #[error("Unknown scope {0}")]
    UnknownScope(ScopeId),

    #[error("Unknown route {0}")]
    UnknownRoute(RouteId),

    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Schema(e) => e.code(),
            EngineError::Build(e) => e.code(),
            EngineError::RouteAfterReady { .. } => ErrorCode::RouteAfterReady,
            EngineError::UnknownScope(_) => ErrorCode::UnknownScope,
            EngineError::UnknownRoute(_) => ErrorCode::UnknownRoute,
            EngineError::Serialize(_) => ErrorCode::Serialization,
        }
    }
}

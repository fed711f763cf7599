//! # Reply Pipeline
//!
//! Turns a handler's [`Reply`] into a [`SentResponse`]. Every path ends in a
//! sent response, including the ones where serialization fails twice.
//!
//! ```text
//! PENDING ─┬─> SENT_RAW                                  (reply serializer override)
//!          └─> RESOLVING_SCHEMA ─> SERIALIZING ─┬─> SENT
//!                                               └─> ERROR_SERIALIZING ─┬─> SENT_ERROR
//!                                                                      └─> DOUBLE_FAILURE ─> SENT_FIXED_FALLBACK
//! ```
//!
//! A reply carrying a [`HandlerError`] enters at `ERROR_SERIALIZING`. A
//! serializer that produces something other than text or bytes is answered
//! with a fixed `ERR_REP_INVALID_PAYLOAD_TYPE` body.

use crate::compiler::{Payload, SerializeFn};
use crate::error::{ErrorCode, SerializeError};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Content type used for JSON bodies produced by the pipeline.
pub const JSON_UTF8: &str = "application/json; charset=utf-8";
const TEXT_UTF8: &str = "text/plain; charset=utf-8";

/// Error properties never copied into the projected body.
const RESERVED_PROPERTIES: &[&str] = &[
    "stack",
    "name",
    "statusCode",
    "status",
    "code",
    "message",
    "error",
    "serialization",
    "validation",
    "validationContext",
];

/// Raw serializer that bypasses the schema pipeline for a whole scope.
pub type ReplySerializer = Arc<dyn Fn(&Value, u16) -> Payload + Send + Sync>;

/// Callback notified of every error a route produces.
pub type ErrorObserver = Arc<dyn Fn(&HandlerError) + Send + Sync>;

/// Where a serializer failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationFailure {
    pub method: String,
    pub url: String,
    pub status: u16,
}

/// An error produced by a handler (or by the pipeline on its behalf).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandlerError {
    pub message: String,
    pub name: String,
    pub status_code: Option<u16>,
    pub code: Option<String>,
    /// Extra properties copied into the projected body.
    pub properties: Map<String, Value>,
    pub stack: Option<String>,
    /// Set when the error comes from a failing response serializer.
    pub serialization: Option<SerializationFailure>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: "Error".to_string(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub(crate) fn from_serialize(err: &SerializeError, failure: SerializationFailure) -> Self {
        Self {
            serialization: Some(failure),
            ..Self::new(err.message())
        }
    }

    /// Fixed projection sent to clients:
    /// `{statusCode, code?, error, message, ...extra properties}`.
    pub fn projection(&self, status: u16) -> Value {
        let mut body = Map::new();
        body.insert("statusCode".to_string(), json!(status));
        if let Some(code) = &self.code {
            body.insert("code".to_string(), json!(code));
        }
        body.insert("error".to_string(), json!(reason_phrase(status)));
        body.insert("message".to_string(), json!(self.message));
        for (key, value) in &self.properties {
            if !RESERVED_PROPERTIES.contains(&key.as_str()) {
                body.insert(key.clone(), value.clone());
            }
        }
        Value::Object(body)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<SerializeError> for HandlerError {
    fn from(err: SerializeError) -> Self {
        HandlerError::new(err.message())
    }
}

/// Canonical reason phrase, `Unknown Status` when there is none.
pub fn reason_phrase(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
}

/// Status and body chosen by an [`ErrorHandler`].
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReply {
    pub status: u16,
    pub body: Value,
}

/// Maps an error to the reply sent in its place.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &HandlerError, reply_status: u16) -> ErrorReply;
}

impl<F> ErrorHandler for F
where
    F: Fn(&HandlerError, u16) -> ErrorReply + Send + Sync,
{
    fn handle(&self, error: &HandlerError, reply_status: u16) -> ErrorReply {
        self(error, reply_status)
    }
}

/// Uses the error's own status if it is an error status, then the reply's,
/// then 500, and sends the standard projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl DefaultErrorHandler {
    pub fn status_for(error: &HandlerError, reply_status: u16) -> u16 {
        match error.status_code {
            Some(status) if status >= 400 => status,
            _ if reply_status >= 400 => reply_status,
            _ => 500,
        }
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, error: &HandlerError, reply_status: u16) -> ErrorReply {
        let status = Self::status_for(error, reply_status);
        if status >= 500 {
            error!(status = status, error = %error, code = ?error.code, "Request failed");
        } else {
            info!(status = status, error = %error, code = ?error.code, "Request rejected");
        }
        ErrorReply {
            status,
            body: error.projection(status),
        }
    }
}

/// What a handler hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Value(Value),
    Error(HandlerError),
}

/// A handler's response before serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: u16,
    content_type: Option<String>,
    body: ReplyBody,
}

impl Reply {
    /// A `200` reply carrying `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: ReplyBody::Value(value.into()),
        }
    }

    pub fn error(error: HandlerError) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: ReplyBody::Error(error),
        }
    }

    pub fn code(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn declared_content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> &ReplyBody {
        &self.body
    }
}

/// Steps of the reply state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    Pending,
    SentRaw,
    ResolvingSchema,
    Serializing,
    Sent,
    ErrorSerializing,
    SentError,
    DoubleFailure,
    SentFixedFallback,
}

impl ReplyState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReplyState::SentRaw
                | ReplyState::Sent
                | ReplyState::SentError
                | ReplyState::SentFixedFallback
        )
    }
}

/// The response as it would go on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SentResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Payload,
    /// Every state visited, ending in a terminal one.
    pub states: Vec<ReplyState>,
}

impl SentResponse {
    pub fn outcome(&self) -> ReplyState {
        self.states.last().copied().unwrap_or(ReplyState::Pending)
    }

    pub fn text(&self) -> String {
        self.body.to_text()
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        match &self.body {
            Payload::Text(text) => serde_json::from_str(text),
            Payload::Binary(bytes) => serde_json::from_slice(bytes),
            Payload::Value(value) => Ok(value.clone()),
        }
    }
}

/// Finds the compiled serializer for a status and content type; `Ok(None)`
/// means no schema applies.
pub(crate) type SerializerLookup<'a> =
    dyn Fn(u16, Option<&str>) -> Result<Option<SerializeFn>, SerializeError> + 'a;

/// Everything the pipeline needs to know about one route.
pub(crate) struct ReplyPipeline<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub reply_serializer: Option<&'a ReplySerializer>,
    pub error_handler: &'a dyn ErrorHandler,
    pub observers: &'a [ErrorObserver],
    pub lookup: &'a SerializerLookup<'a>,
}

impl ReplyPipeline<'_> {
    pub(crate) fn send(&self, reply: Reply) -> SentResponse {
        let mut states = vec![ReplyState::Pending];
        let Reply {
            status,
            content_type,
            body,
        } = reply;
        let value = match body {
            ReplyBody::Error(err) => {
                return self.send_error(err, status, content_type, states);
            }
            ReplyBody::Value(value) => value,
        };

        if let Some(raw) = self.reply_serializer {
            let payload = raw(&value, status);
            if !payload.is_sendable() {
                return self.invalid_payload(&payload, states);
            }
            states.push(ReplyState::SentRaw);
            return self.finish(status, content_type.unwrap_or_else(|| JSON_UTF8.to_string()), payload, states);
        }

        states.push(ReplyState::ResolvingSchema);
        let serializer = match (self.lookup)(status, content_type.as_deref()) {
            Ok(serializer) => serializer,
            Err(err) => {
                let failure = self.failure(status);
                return self.send_error(HandlerError::from_serialize(&err, failure), status, content_type, states);
            }
        };

        let Some(serializer) = serializer else {
            debug!(method = %self.method, url = %self.url, status = status, "No response schema, sending raw payload");
            states.push(ReplyState::Sent);
            let (default_type, payload) = generic_payload(value);
            return self.finish(status, content_type.unwrap_or_else(|| default_type.to_string()), payload, states);
        };

        states.push(ReplyState::Serializing);
        match serializer(&value) {
            Ok(payload) if payload.is_sendable() => {
                states.push(ReplyState::Sent);
                self.finish(status, content_type.unwrap_or_else(|| JSON_UTF8.to_string()), payload, states)
            }
            Ok(payload) => self.invalid_payload(&payload, states),
            Err(err) => {
                let failure = self.failure(status);
                self.send_error(HandlerError::from_serialize(&err, failure), status, content_type, states)
            }
        }
    }

    fn send_error(
        &self,
        err: HandlerError,
        reply_status: u16,
        content_type: Option<String>,
        mut states: Vec<ReplyState>,
    ) -> SentResponse {
        states.push(ReplyState::ErrorSerializing);
        for observer in self.observers {
            observer(&err);
        }
        let ErrorReply { status, body } = self.error_handler.handle(&err, reply_status);

        let result = match self.reply_serializer {
            Some(raw) => Ok(raw(&body, status)),
            None => match (self.lookup)(status, content_type.as_deref()) {
                Ok(Some(serializer)) => serializer(&body),
                Ok(None) => Ok(generic_payload(body).1),
                Err(inner) => Err(inner),
            },
        };

        match result {
            Ok(payload) if payload.is_sendable() => {
                states.push(ReplyState::SentError);
                self.finish(status, content_type.unwrap_or_else(|| JSON_UTF8.to_string()), payload, states)
            }
            Ok(payload) => self.invalid_payload(&payload, states),
            Err(inner) => {
                error!(
                    method = %self.method,
                    url = %self.url,
                    status = status,
                    inner_error = %inner,
                    original_error = %err.message,
                    "Failed to serialize an error"
                );
                states.push(ReplyState::DoubleFailure);
                let body = json!({
                    "statusCode": 500,
                    "code": ErrorCode::FailedErrorSerialization.as_str(),
                    "message": format!(
                        "Failed to serialize an error. Error: {}. Original error: {}",
                        inner.message(),
                        err.message
                    ),
                });
                states.push(ReplyState::SentFixedFallback);
                self.finish(500, JSON_UTF8.to_string(), Payload::Text(body.to_string()), states)
            }
        }
    }

    fn invalid_payload(&self, payload: &Payload, mut states: Vec<ReplyState>) -> SentResponse {
        let type_name = payload.type_name();
        error!(
            method = %self.method,
            url = %self.url,
            payload_type = type_name,
            "Serializer returned an invalid payload type"
        );
        let body = json!({
            "statusCode": 500,
            "code": ErrorCode::InvalidPayloadType.as_str(),
            "message": format!(
                "Attempted to send payload of invalid type '{type_name}'. Expected a string or binary payload."
            ),
        });
        states.push(ReplyState::SentFixedFallback);
        self.finish(500, JSON_UTF8.to_string(), Payload::Text(body.to_string()), states)
    }

    fn failure(&self, status: u16) -> SerializationFailure {
        SerializationFailure {
            method: self.method.to_string(),
            url: self.url.to_string(),
            status,
        }
    }

    fn finish(
        &self,
        status: u16,
        content_type: String,
        body: Payload,
        states: Vec<ReplyState>,
    ) -> SentResponse {
        debug!(
            method = %self.method,
            url = %self.url,
            status = status,
            states = ?states,
            "Reply sent"
        );
        SentResponse {
            status,
            content_type,
            body,
            states,
        }
    }
}

/// Serialization used when no schema applies: strings go out verbatim,
/// everything else as JSON.
pub(crate) fn generic_payload(value: Value) -> (&'static str, Payload) {
    match value {
        Value::String(text) => (TEXT_UTF8, Payload::Text(text)),
        other => (JSON_UTF8, Payload::Text(other.to_string())),
    }
}

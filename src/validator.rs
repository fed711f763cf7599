//! Input validation and build diagnostics.
//!
//! Route input schemas (`body`, `querystring`, `params`, `headers`) are
//! bundled against the scope's shared schemas and compiled with `jsonschema`
//! during the ready pass. A failed check becomes a `400` [`HandlerError`]
//! with code `ERR_VALIDATION`, which is then sent through the regular error
//! serialization path.

use crate::error::{BuildError, ErrorCode};
use crate::reply::HandlerError;
use crate::schema::{SchemaDocument, SchemaSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Which part of the request a schema applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputPart {
    Body,
    Querystring,
    Params,
    Headers,
}

impl InputPart {
    pub const ALL: [InputPart; 4] = [
        InputPart::Headers,
        InputPart::Params,
        InputPart::Querystring,
        InputPart::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputPart::Body => "body",
            InputPart::Querystring => "querystring",
            InputPart::Params => "params",
            InputPart::Headers => "headers",
        }
    }
}

impl fmt::Display for InputPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input schemas declared on a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchemas {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub querystring: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
}

impl InputSchemas {
    pub fn get(&self, part: InputPart) -> Option<&Value> {
        match part {
            InputPart::Body => self.body.as_ref(),
            InputPart::Querystring => self.querystring.as_ref(),
            InputPart::Params => self.params.as_ref(),
            InputPart::Headers => self.headers.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        InputPart::ALL.iter().all(|p| self.get(*p).is_none())
    }
}

/// The request as seen by validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestInput {
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub querystring: Map<String, Value>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub headers: Map<String, Value>,
}

impl RequestInput {
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.querystring.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Header names are stored lowercased.
    pub fn with_header(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    fn part(&self, part: InputPart) -> Value {
        match part {
            InputPart::Body => self.body.clone().unwrap_or(Value::Null),
            InputPart::Querystring => Value::Object(self.querystring.clone()),
            InputPart::Params => Value::Object(self.params.clone()),
            InputPart::Headers => Value::Object(self.headers.clone()),
        }
    }
}

/// Compiled validators of one route.
#[derive(Default)]
pub struct InputValidators {
    validators: Vec<(InputPart, jsonschema::Validator)>,
}

impl InputValidators {
    /// Bundle and compile every declared input schema.
    pub fn compile(
        schemas: &InputSchemas,
        set: &SchemaSet,
        method: &str,
        url: &str,
    ) -> Result<Self, BuildError> {
        let mut validators = Vec::new();
        for part in InputPart::ALL {
            let Some(schema) = schemas.get(part) else {
                continue;
            };
            let document = Arc::new(SchemaDocument::inline(schema.clone()));
            let bundled = set
                .bundle(&document)
                .map_err(|source| BuildError::Schema {
                    method: method.to_string(),
                    url: url.to_string(),
                    source,
                })?;
            let validator = jsonschema::options()
                .should_validate_formats(true)
                .build(&bundled)
                .map_err(|e| BuildError::ValidationBuild {
                    part: part.to_string(),
                    method: method.to_string(),
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            validators.push((part, validator));
        }
        Ok(Self { validators })
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Check `input`; the first failing part yields a `400` error.
    pub fn validate(&self, input: &RequestInput) -> Result<(), HandlerError> {
        for (part, validator) in &self.validators {
            let value = input.part(*part);
            validator.validate(&value).map_err(|err| {
                HandlerError::new(format!("{part} {err}"))
                    .with_status(400)
                    .with_code(ErrorCode::Validation.as_str())
                    .with_property("validationContext", part.as_str())
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for InputValidators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.validators.iter().map(|(p, _)| p.as_str()).collect();
        f.debug_struct("InputValidators").field("parts", &parts).finish()
    }
}

/// One problem found while checking a set of routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(location: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

pub fn print_issues(issues: &[ValidationIssue]) {
    eprintln!("\n❌ Route manifest check failed. {} issue(s) found:\n", issues.len());
    for issue in issues {
        eprintln!("{issue}");
    }
    eprintln!("\nPlease fix the issues in your manifest before starting the server.\n");
}

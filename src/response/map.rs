use super::selector::StatusSelector;
use crate::error::BuildError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Content type assumed when the reply does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Content map key matching any outgoing content type.
pub const WILDCARD_CONTENT_TYPE: &str = "*/*";

/// What happens when a declared selector's content map has no entry for the
/// outgoing content type and no `*/*` entry either.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentFallthrough {
    /// The declared selector is authoritative: no schema, raw payload.
    #[default]
    Stop,
    /// Keep looking at the next precedence level (class, then default).
    Next,
}

impl FromStr for ContentFallthrough {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(ContentFallthrough::Stop),
            "next" => Ok(ContentFallthrough::Next),
            other => Err(format!("invalid content fallthrough '{other}' (expected stop|next)")),
        }
    }
}

impl fmt::Display for ContentFallthrough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentFallthrough::Stop => f.write_str("stop"),
            ContentFallthrough::Next => f.write_str("next"),
        }
    }
}

/// Lowercased media type with parameters (`; charset=..`) removed.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Per-content-type schemas declared under one status selector.
#[derive(Debug, Clone, Default)]
pub struct ContentMap {
    entries: Vec<(String, Value)>,
    wildcard: Option<Value>,
}

impl ContentMap {
    fn lookup(&self, content_type: &str) -> Option<(&str, &Value)> {
        self.entries
            .iter()
            .find(|(key, _)| key == content_type)
            .map(|(key, schema)| (key.as_str(), schema))
            .or_else(|| {
                self.wildcard
                    .as_ref()
                    .map(|schema| (WILDCARD_CONTENT_TYPE, schema))
            })
    }

    /// Declared content types in declaration order, `*/*` last.
    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|(key, _)| key.as_str())
            .chain(self.wildcard.as_ref().map(|_| WILDCARD_CONTENT_TYPE))
    }
}

/// What one selector declares: a single schema or a content map.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Schema(Value),
    Content(ContentMap),
}

#[derive(Debug, Clone)]
pub struct ResponseEntry {
    pub selector: StatusSelector,
    pub body: ResponseBody,
}

/// A schema picked for one (status, content type) pair.
///
/// `content_type` is the *declared* key that matched (`*/*` included), or
/// `None` when the selector holds a plain schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaSlot<'a> {
    pub selector: StatusSelector,
    pub content_type: Option<&'a str>,
    pub schema: &'a Value,
}

/// A route's response declaration, validated and ordered by precedence.
#[derive(Debug, Clone, Default)]
pub struct ResponseSchemaMap {
    entries: Vec<ResponseEntry>,
}

impl ResponseSchemaMap {
    /// Validate a `response` declaration.
    ///
    /// Every key must be a status selector. A selector whose value has a
    /// `content` object is a content map; each of its non-wildcard keys must
    /// carry a `schema`. A wildcard key without a schema is ignored.
    pub fn build(declaration: &Value, method: &str, url: &str) -> Result<Self, BuildError> {
        let Some(decl) = declaration.as_object() else {
            return Ok(Self::default());
        };
        let mut entries = Vec::with_capacity(decl.len());
        for (key, value) in decl {
            let selector =
                StatusSelector::parse(key).ok_or_else(|| BuildError::InvalidStatusSelector {
                    selector: key.clone(),
                    method: method.to_string(),
                    url: url.to_string(),
                })?;
            let body = match value.get("content").and_then(Value::as_object) {
                Some(content) => {
                    let mut map = ContentMap::default();
                    for (content_type, entry) in content {
                        let schema = entry.get("schema").cloned();
                        if content_type.trim() == WILDCARD_CONTENT_TYPE {
                            map.wildcard = schema;
                            continue;
                        }
                        let schema = schema.ok_or_else(|| BuildError::ContentMissingSchema {
                            content_type: content_type.clone(),
                            method: method.to_string(),
                            url: url.to_string(),
                        })?;
                        map.entries
                            .push((normalize_content_type(content_type), schema));
                    }
                    ResponseBody::Content(map)
                }
                None => ResponseBody::Schema(value.clone()),
            };
            entries.push(ResponseEntry { selector, body });
        }
        // Stable: equal selectors keep declaration order.
        entries.sort_by_key(|entry| entry.selector.precedence());
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ResponseEntry] {
        &self.entries
    }

    /// Every declared (selector, content type, schema) triple.
    pub fn slots(&self) -> impl Iterator<Item = SchemaSlot<'_>> {
        self.entries.iter().flat_map(|entry| {
            let slots: Vec<SchemaSlot<'_>> = match &entry.body {
                ResponseBody::Schema(schema) => vec![SchemaSlot {
                    selector: entry.selector,
                    content_type: None,
                    schema,
                }],
                ResponseBody::Content(map) => map
                    .entries
                    .iter()
                    .map(|(ct, schema)| (ct.as_str(), schema))
                    .chain(map.wildcard.as_ref().map(|s| (WILDCARD_CONTENT_TYPE, s)))
                    .map(|(ct, schema)| SchemaSlot {
                        selector: entry.selector,
                        content_type: Some(ct),
                        schema,
                    })
                    .collect(),
            };
            slots
        })
    }

    /// Pick the schema for an outgoing status and content type.
    ///
    /// `content_type` is the reply's declared content type; when absent the
    /// lookup uses `application/json`.
    pub fn resolve(
        &self,
        status: u16,
        content_type: Option<&str>,
        fallthrough: ContentFallthrough,
    ) -> Option<SchemaSlot<'_>> {
        let content_type = content_type
            .map(normalize_content_type)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        for entry in self.entries.iter().filter(|e| e.selector.matches(status)) {
            match &entry.body {
                ResponseBody::Schema(schema) => {
                    return Some(SchemaSlot {
                        selector: entry.selector,
                        content_type: None,
                        schema,
                    })
                }
                ResponseBody::Content(map) => {
                    if let Some((key, schema)) = map.lookup(&content_type) {
                        return Some(SchemaSlot {
                            selector: entry.selector,
                            content_type: Some(key),
                            schema,
                        });
                    }
                    if fallthrough == ContentFallthrough::Stop {
                        return None;
                    }
                }
            }
        }
        None
    }
}

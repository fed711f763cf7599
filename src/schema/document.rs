use super::refs::{canonical_id, escape_pointer_token, join_uri};
use crate::error::SchemaError;
use serde_json::Value;
use std::collections::HashMap;

/// Keywords whose value is a single sub-schema.
const SCHEMA_KEYWORDS: &[&str] = &[
    "not",
    "additionalProperties",
    "additionalItems",
    "contains",
    "propertyNames",
    "if",
    "then",
    "else",
    "unevaluatedProperties",
    "unevaluatedItems",
];

/// Keywords whose value is a map of name → sub-schema.
const SCHEMA_MAP_KEYWORDS: &[&str] = &[
    "properties",
    "patternProperties",
    "dependentSchemas",
    "definitions",
    "$defs",
];

/// Keywords whose value is a list of sub-schemas.
const SCHEMA_LIST_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf", "prefixItems"];

/// Visit the direct sub-schemas of `schema`, passing each with its JSON pointer.
///
/// Data keywords (`const`, `enum`, `default`, `examples`, ...) are never
/// entered, so a literal `{"$ref": ..}` inside an example is not a reference.
pub(crate) fn for_each_subschema(schema: &Value, pointer: &str, f: &mut dyn FnMut(&Value, &str)) {
    let Some(obj) = schema.as_object() else {
        return;
    };
    for (key, value) in obj {
        let key_ptr = format!("{pointer}/{}", escape_pointer_token(key));
        if SCHEMA_KEYWORDS.contains(&key.as_str()) {
            f(value, &key_ptr);
        } else if SCHEMA_MAP_KEYWORDS.contains(&key.as_str()) {
            if let Some(map) = value.as_object() {
                for (name, sub) in map {
                    f(sub, &format!("{key_ptr}/{}", escape_pointer_token(name)));
                }
            }
        } else if SCHEMA_LIST_KEYWORDS.contains(&key.as_str()) {
            if let Some(list) = value.as_array() {
                for (i, sub) in list.iter().enumerate() {
                    f(sub, &format!("{key_ptr}/{i}"));
                }
            }
        } else if key == "items" {
            match value {
                Value::Array(list) => {
                    for (i, sub) in list.iter().enumerate() {
                        f(sub, &format!("{key_ptr}/{i}"));
                    }
                }
                other => f(other, &key_ptr),
            }
        }
    }
}

/// A schema document addressable by identifier and fragment.
///
/// Nested `$id: "#name"` and `$anchor: "name"` declarations are indexed as
/// anchors; nested `$id`s that are not plain fragments are indexed as
/// embedded documents with their own absolute identifier.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    id: Option<String>,
    root: Value,
    anchors: HashMap<String, String>,
    embedded: Vec<(String, String)>,
}

impl SchemaDocument {
    /// Build a shared document; its `$id` is mandatory.
    pub fn new(root: Value) -> Result<Self, SchemaError> {
        let id = root
            .get("$id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != "#")
            .ok_or(SchemaError::MissingId)?;
        let id = canonical_id(id);
        Ok(Self::indexed(Some(id), root))
    }

    /// Wrap a route-local schema; `$id` is optional.
    pub fn inline(root: Value) -> Self {
        let id = root
            .get("$id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty() && !id.starts_with('#'))
            .map(canonical_id);
        Self::indexed(id, root)
    }

    fn indexed(id: Option<String>, root: Value) -> Self {
        let mut anchors = HashMap::new();
        let mut embedded = Vec::new();
        index_node(&root, "", id.as_deref(), &mut anchors, &mut embedded);
        Self {
            id,
            root,
            anchors,
            embedded,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Embedded sub-schemas declared with their own absolute `$id`.
    pub fn embedded(&self) -> &[(String, String)] {
        &self.embedded
    }

    pub fn anchor(&self, name: &str) -> Option<&str> {
        self.anchors.get(name).map(String::as_str)
    }

    /// Translate a fragment into a JSON pointer inside this document.
    ///
    /// Empty fragments address the root, `/..` fragments are pointers, and
    /// anything else is looked up as an anchor.
    pub fn fragment_pointer(&self, fragment: &str) -> Option<String> {
        if fragment.is_empty() {
            return Some(String::new());
        }
        if fragment.starts_with('/') {
            return self.root.pointer(fragment).map(|_| fragment.to_string());
        }
        self.anchor(fragment).map(str::to_string)
    }

    /// Label used in cache keys and log lines.
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("<inline>")
    }
}

fn index_node(
    node: &Value,
    pointer: &str,
    doc_id: Option<&str>,
    anchors: &mut HashMap<String, String>,
    embedded: &mut Vec<(String, String)>,
) {
    if !pointer.is_empty() {
        if let Some(id) = node.get("$id").and_then(Value::as_str) {
            if let Some(name) = id.strip_prefix('#') {
                if !name.is_empty() {
                    anchors.insert(name.to_string(), pointer.to_string());
                }
            } else if !id.trim().is_empty() {
                embedded.push((join_uri(doc_id, id), pointer.to_string()));
            }
        }
    }
    if let Some(name) = node.get("$anchor").and_then(Value::as_str) {
        anchors.insert(name.to_string(), pointer.to_string());
    }
    for_each_subschema(node, pointer, &mut |sub, sub_ptr| {
        index_node(sub, sub_ptr, doc_id, anchors, embedded);
    });
}

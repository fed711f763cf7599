//! # Schema Store
//!
//! Shared schema documents registered by identifier, and the merged
//! [`SchemaSet`] view a scope sees (its own documents plus its ancestors').
//!
//! ## Reference Resolution
//!
//! References are resolved lazily against the set's contents at the time of
//! the call, so two documents may reference each other regardless of the
//! order in which they were registered:
//!
//! - `http://example.com/point.json#` - whole document by absolute id
//! - `test` - bare identifier
//! - `http://example.com/asset.json#/definitions/inner` - JSON pointer fragment
//! - `#address` - anchor (`$id: "#address"`) inside the current document
//!
//! Resolution never mutates the set.

use super::document::{for_each_subschema, SchemaDocument};
use super::refs::{canonical_id, join_uri, split_ref};
use crate::error::SchemaError;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Depth after which bundling stops inlining a recursive reference.
const MAX_BUNDLE_DEPTH: usize = 32;

/// Schemas registered directly on one scope.
#[derive(Debug, Clone, Default)]
pub struct SchemaStore {
    documents: Vec<Arc<SchemaDocument>>,
    index: HashMap<String, usize>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under its `$id`.
    ///
    /// Fails with [`SchemaError::MissingId`] when the id is absent or empty and
    /// with [`SchemaError::AlreadyPresent`] when this store already holds it.
    pub fn register(&mut self, document: Value) -> Result<Arc<SchemaDocument>, SchemaError> {
        let doc = Arc::new(SchemaDocument::new(document)?);
        let id = doc.id().unwrap_or_default().to_string();
        if self.index.contains_key(&id) {
            return Err(SchemaError::AlreadyPresent { id });
        }
        self.index.insert(id, self.documents.len());
        self.documents.push(Arc::clone(&doc));
        Ok(doc)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(&canonical_id(id))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<SchemaDocument>> {
        self.index
            .get(&canonical_id(id))
            .and_then(|i| self.documents.get(*i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SchemaDocument>> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A successfully resolved reference: a document and a pointer into it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub document: Arc<SchemaDocument>,
    pub pointer: String,
}

impl Resolved {
    pub fn schema(&self) -> Option<&Value> {
        self.document.root().pointer(&self.pointer)
    }

    /// Stable identity of the target, used to memoise compiled nodes.
    pub fn key(&self) -> String {
        format!(
            "{}@{:p}#{}",
            self.document.label(),
            Arc::as_ptr(&self.document),
            self.pointer
        )
    }
}

/// Every schema visible from one scope, tagged with the generation it was
/// assembled at.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    documents: HashMap<String, Arc<SchemaDocument>>,
    embedded: HashMap<String, (Arc<SchemaDocument>, String)>,
    generation: u64,
}

impl SchemaSet {
    /// Merge stores ordered from the outermost scope inwards.
    pub fn from_stores<'a>(stores: impl IntoIterator<Item = &'a SchemaStore>, generation: u64) -> Self {
        let mut documents = HashMap::new();
        let mut embedded = HashMap::new();
        for store in stores {
            for doc in store.iter() {
                if let Some(id) = doc.id() {
                    documents.insert(id.to_string(), Arc::clone(doc));
                }
                for (abs, pointer) in doc.embedded() {
                    embedded.insert(abs.clone(), (Arc::clone(doc), pointer.clone()));
                }
            }
        }
        Self {
            documents,
            embedded,
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(&canonical_id(id))
    }

    pub fn document(&self, id: &str) -> Option<&Arc<SchemaDocument>> {
        self.documents.get(&canonical_id(id))
    }

    /// First 16 hex chars of a SHA-256 over every visible document.
    ///
    /// Ids are hashed in sorted order so the fingerprint only depends on
    /// content, not on registration order.
    pub fn fingerprint(&self) -> String {
        let mut ids: Vec<&String> = self.documents.keys().collect();
        ids.sort();
        let mut hasher = Sha256::new();
        for id in ids {
            hasher.update(id.as_bytes());
            if let Some(doc) = self.documents.get(id) {
                hasher.update(doc.root().to_string().as_bytes());
            }
        }
        hasher
            .finalize()
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Resolve `reference` as written inside `from`.
    pub fn resolve_ref(
        &self,
        reference: &str,
        from: &Arc<SchemaDocument>,
    ) -> Result<Resolved, SchemaError> {
        let not_found = || SchemaError::RefNotFound {
            reference: reference.to_string(),
            base: from.id().map(str::to_string),
        };
        let (uri, fragment) = split_ref(reference);

        let (document, base_pointer) = if uri.is_empty() {
            (Arc::clone(from), String::new())
        } else {
            self.locate(uri, from).ok_or_else(not_found)?
        };

        let pointer = if fragment.is_empty() {
            Some(base_pointer)
        } else if fragment.starts_with('/') {
            Some(format!("{base_pointer}{fragment}"))
        } else {
            document.anchor(fragment).map(str::to_string)
        };
        if let Some(pointer) = pointer {
            if document.root().pointer(&pointer).is_some() {
                return Ok(Resolved { document, pointer });
            }
        }

        // `#name` declared on a shared document of its own.
        if uri.is_empty() {
            if let Some(doc) = self.documents.get(reference) {
                return Ok(Resolved {
                    document: Arc::clone(doc),
                    pointer: String::new(),
                });
            }
        }
        Err(not_found())
    }

    fn locate(&self, uri: &str, from: &Arc<SchemaDocument>) -> Option<(Arc<SchemaDocument>, String)> {
        let joined = join_uri(from.id(), uri);
        let bare = canonical_id(uri);
        for candidate in [&joined, &bare] {
            if let Some(doc) = self.documents.get(candidate) {
                return Some((Arc::clone(doc), String::new()));
            }
            if let Some((doc, pointer)) = self.embedded.get(candidate) {
                return Some((Arc::clone(doc), pointer.clone()));
            }
            if from.id() == Some(candidate.as_str()) {
                return Some((Arc::clone(from), String::new()));
            }
        }
        None
    }

    /// Verify that every `$ref` reachable from `document` resolves.
    pub fn check_refs(&self, document: &Arc<SchemaDocument>) -> Result<(), SchemaError> {
        let mut visited = HashSet::new();
        self.check_node(document.root(), document, &mut visited)
    }

    fn check_node(
        &self,
        node: &Value,
        base: &Arc<SchemaDocument>,
        visited: &mut HashSet<String>,
    ) -> Result<(), SchemaError> {
        if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
            let resolved = self.resolve_ref(reference, base)?;
            if visited.insert(resolved.key()) {
                if let Some(target) = resolved.schema() {
                    self.check_node(target, &resolved.document, visited)?;
                }
            }
        }
        let mut result = Ok(());
        for_each_subschema(node, "", &mut |sub, _| {
            if result.is_ok() {
                result = self.check_node(sub, base, visited);
            }
        });
        result
    }

    /// Produce a self-contained copy of `document` with references inlined.
    ///
    /// Identifier and definition keywords are dropped from the output since
    /// nothing refers to them any more. A reference that re-enters a target
    /// already being inlined is replaced by the permissive schema `{}`.
    pub fn bundle(&self, document: &Arc<SchemaDocument>) -> Result<Value, SchemaError> {
        self.bundle_schema(document.root(), document)
    }

    /// Bundle a sub-schema whose references are relative to `base`.
    pub fn bundle_schema(
        &self,
        schema: &Value,
        base: &Arc<SchemaDocument>,
    ) -> Result<Value, SchemaError> {
        let mut stack = Vec::new();
        self.bundle_node(schema, base, &mut stack)
    }

    fn bundle_node(
        &self,
        node: &Value,
        base: &Arc<SchemaDocument>,
        stack: &mut Vec<String>,
    ) -> Result<Value, SchemaError> {
        let Some(obj) = node.as_object() else {
            return Ok(node.clone());
        };
        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            let resolved = self.resolve_ref(reference, base)?;
            let key = resolved.key();
            if stack.contains(&key) || stack.len() >= MAX_BUNDLE_DEPTH {
                return Ok(Value::Object(Map::new()));
            }
            let target = resolved.schema().cloned().unwrap_or(Value::Bool(true));
            stack.push(key);
            let out = self.bundle_node(&target, &resolved.document, stack);
            stack.pop();
            return out;
        }

        let mut out = Map::new();
        for (key, value) in obj {
            match key.as_str() {
                "$id" | "$schema" | "$anchor" | "definitions" | "$defs" | "$comment" => {}
                "properties" | "patternProperties" | "dependentSchemas" => {
                    let mut inner = Map::new();
                    if let Some(map) = value.as_object() {
                        for (name, sub) in map {
                            inner.insert(name.clone(), self.bundle_node(sub, base, stack)?);
                        }
                    }
                    out.insert(key.clone(), Value::Object(inner));
                }
                "allOf" | "anyOf" | "oneOf" | "prefixItems" | "items" if value.is_array() => {
                    let mut list = Vec::new();
                    for sub in value.as_array().into_iter().flatten() {
                        list.push(self.bundle_node(sub, base, stack)?);
                    }
                    out.insert(key.clone(), Value::Array(list));
                }
                "items" | "not" | "additionalProperties" | "additionalItems" | "contains"
                | "propertyNames" | "if" | "then" | "else" | "unevaluatedProperties"
                | "unevaluatedItems" => {
                    out.insert(key.clone(), self.bundle_node(value, base, stack)?);
                }
                _ => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(Value::Object(out))
    }
}

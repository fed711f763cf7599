//! Serialization plans.
//!
//! A plan is a flat arena of nodes built once from a schema. `$ref` targets
//! are memoised by their resolved location, so recursive schemas produce a
//! cyclic graph instead of unbounded recursion at build time.

use super::{json_type_name, Rounding, SerializerOptions};
use crate::error::{SchemaError, SerializeError};
use crate::schema::{SchemaDocument, SchemaSet};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

type NodeId = usize;

/// Depth bound for shallow type tests through alias chains.
const MAX_SHALLOW_DEPTH: usize = 16;

/// Nesting bound of one serialization; unions and aliases that loop back
/// without consuming input hit it too.
const MAX_WRITE_DEPTH: usize = 256;

enum Node {
    Any,
    Alias(NodeId),
    Const { value: Value, rendered: String },
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Object(ObjectPlan),
    Array(ArrayPlan),
    Union(Vec<Branch>),
    Nullable(NodeId),
}

struct Branch {
    node: NodeId,
    validator: Option<jsonschema::Validator>,
}

struct PropertyPlan {
    name: String,
    /// `"name":` pre-rendered
    key: String,
    node: NodeId,
    default: Option<Value>,
}

enum Additional {
    Drop,
    Any,
    Schema(NodeId),
}

struct ObjectPlan {
    properties: Vec<PropertyPlan>,
    required: Vec<String>,
    patterns: Vec<(Regex, NodeId)>,
    additional: Additional,
}

struct ArrayPlan {
    prefix: Vec<NodeId>,
    items: NodeId,
}

pub(crate) struct Plan {
    nodes: Vec<Node>,
    root: NodeId,
    rounding: Rounding,
}

impl Plan {
    pub(crate) fn build(
        schema: &Value,
        base: &Arc<SchemaDocument>,
        schemas: &SchemaSet,
        options: SerializerOptions,
    ) -> Result<Self, SchemaError> {
        let mut builder = Builder {
            schemas,
            nodes: Vec::new(),
            memo: HashMap::new(),
        };
        let root = builder.compile(schema, base)?;
        Ok(Self {
            nodes: builder.nodes,
            root,
            rounding: options.rounding,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn serialize(&self, value: &Value) -> Result<String, SerializeError> {
        let mut out = Vec::with_capacity(128);
        self.write(self.root, value, &mut out, 0)?;
        String::from_utf8(out).map_err(|e| SerializeError::new(e.to_string()))
    }

    fn write(
        &self,
        id: NodeId,
        value: &Value,
        out: &mut Vec<u8>,
        depth: usize,
    ) -> Result<(), SerializeError> {
        if depth > MAX_WRITE_DEPTH {
            return Err(SerializeError::new(format!(
                "Maximum serialization depth of {MAX_WRITE_DEPTH} exceeded."
            )));
        }
        let depth = depth + 1;
        let Some(node) = self.nodes.get(id) else {
            return write_json(value, out);
        };
        match node {
            Node::Any => write_json(value, out),
            Node::Alias(target) => self.write(*target, value, out, depth),
            Node::Const { rendered, .. } => {
                out.extend_from_slice(rendered.as_bytes());
                Ok(())
            }
            Node::Null => {
                out.extend_from_slice(b"null");
                Ok(())
            }
            Node::Boolean => {
                let text: &[u8] = if truthy(value) { b"true" } else { b"false" };
                out.extend_from_slice(text);
                Ok(())
            }
            Node::Integer => {
                out.extend_from_slice(self.integer_text(value)?.as_bytes());
                Ok(())
            }
            Node::Number => {
                out.extend_from_slice(number_text(value)?.as_bytes());
                Ok(())
            }
            Node::String => match value {
                Value::String(s) => write_str(s, out),
                Value::Null => write_str("", out),
                other => write_str(&js_string(other), out),
            },
            Node::Object(plan) => self.write_object(plan, value, out, depth),
            Node::Array(plan) => self.write_array(plan, value, out, depth),
            Node::Union(branches) => {
                let chosen = branches
                    .iter()
                    .find(|branch| self.accepts(branch, value))
                    .or_else(|| branches.first());
                match chosen {
                    Some(branch) => self.write(branch.node, value, out, depth),
                    None => write_json(value, out),
                }
            }
            Node::Nullable(inner) => {
                if value.is_null() {
                    out.extend_from_slice(b"null");
                    Ok(())
                } else {
                    self.write(*inner, value, out, depth)
                }
            }
        }
    }

    fn write_object(
        &self,
        plan: &ObjectPlan,
        value: &Value,
        out: &mut Vec<u8>,
        depth: usize,
    ) -> Result<(), SerializeError> {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);

        for name in &plan.required {
            let has_default = plan
                .properties
                .iter()
                .any(|p| &p.name == name && p.default.is_some());
            if !obj.contains_key(name) && !has_default {
                return Err(SerializeError::new(format!("\"{name}\" is required!")));
            }
        }

        out.push(b'{');
        let mut first = true;
        for prop in &plan.properties {
            let Some(field) = obj.get(&prop.name).or(prop.default.as_ref()) else {
                continue;
            };
            if !first {
                out.push(b',');
            }
            first = false;
            out.extend_from_slice(prop.key.as_bytes());
            self.write(prop.node, field, out, depth)?;
        }

        if !plan.patterns.is_empty() || !matches!(plan.additional, Additional::Drop) {
            for (key, field) in obj {
                if plan.properties.iter().any(|p| &p.name == key) {
                    continue;
                }
                let pattern = plan
                    .patterns
                    .iter()
                    .find(|(re, _)| re.is_match(key))
                    .map(|(_, node)| *node);
                let node = match (pattern, &plan.additional) {
                    (Some(node), _) => Some(node),
                    (None, Additional::Schema(node)) => Some(*node),
                    (None, Additional::Any) => None,
                    (None, Additional::Drop) => continue,
                };
                if !first {
                    out.push(b',');
                }
                first = false;
                write_str(key, out)?;
                out.push(b':');
                match node {
                    Some(node) => self.write(node, field, out, depth)?,
                    None => write_json(field, out)?,
                }
            }
        }
        out.push(b'}');
        Ok(())
    }

    fn write_array(
        &self,
        plan: &ArrayPlan,
        value: &Value,
        out: &mut Vec<u8>,
        depth: usize,
    ) -> Result<(), SerializeError> {
        let Some(items) = value.as_array() else {
            return Err(SerializeError::new(format!(
                "The value \"{}\" does not match schema definition: expected an array, received {}.",
                js_string(value),
                json_type_name(value)
            )));
        };
        out.push(b'[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            let node = plan.prefix.get(i).copied().unwrap_or(plan.items);
            self.write(node, item, out, depth)?;
        }
        out.push(b']');
        Ok(())
    }

    fn accepts(&self, branch: &Branch, value: &Value) -> bool {
        match &branch.validator {
            Some(validator) => validator.is_valid(value),
            None => self.shallow_match(branch.node, value, 0),
        }
    }

    fn shallow_match(&self, id: NodeId, value: &Value, depth: usize) -> bool {
        if depth > MAX_SHALLOW_DEPTH {
            return true;
        }
        match self.nodes.get(id) {
            None | Some(Node::Any) => true,
            Some(Node::Alias(target)) => self.shallow_match(*target, value, depth + 1),
            Some(Node::Const { value: expected, .. }) => expected == value,
            Some(Node::Null) => value.is_null(),
            Some(Node::Boolean) => value.is_boolean(),
            Some(Node::Integer) => is_integral(value),
            Some(Node::Number) => value.is_number(),
            Some(Node::String) => value.is_string(),
            Some(Node::Object(_)) => value.is_object(),
            Some(Node::Array(_)) => value.is_array(),
            Some(Node::Union(branches)) => branches
                .iter()
                .any(|b| self.shallow_match(b.node, value, depth + 1)),
            Some(Node::Nullable(inner)) => {
                value.is_null() || self.shallow_match(*inner, value, depth + 1)
            }
        }
    }

    fn integer_text(&self, value: &Value) -> Result<String, SerializeError> {
        let float = match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(i.to_string());
                }
                if let Some(u) = n.as_u64() {
                    return Ok(u.to_string());
                }
                n.as_f64()
            }
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null => Some(0.0),
            Value::String(s) if s.trim().is_empty() => Some(0.0),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match float.filter(|f| f.is_finite()) {
            Some(f) => Ok(integer_string(self.rounding.apply(f))),
            None => Err(SerializeError::new(format!(
                "The value \"{}\" cannot be converted to an integer.",
                js_string(value)
            ))),
        }
    }
}

struct Builder<'a> {
    schemas: &'a SchemaSet,
    nodes: Vec<Node>,
    memo: HashMap<String, NodeId>,
}

impl Builder<'_> {
    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn compile(&mut self, schema: &Value, base: &Arc<SchemaDocument>) -> Result<NodeId, SchemaError> {
        let Some(obj) = schema.as_object() else {
            return Ok(self.push(Node::Any));
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            return self.compile_ref(reference, base);
        }

        if obj.get("nullable") == Some(&Value::Bool(true)) {
            let mut inner = obj.clone();
            inner.remove("nullable");
            let inner = self.compile(&Value::Object(inner), base)?;
            return Ok(self.push(Node::Nullable(inner)));
        }

        if let Some(value) = obj.get("const") {
            return Ok(self.push(Node::Const {
                value: value.clone(),
                rendered: value.to_string(),
            }));
        }

        if let Some(parts) = obj.get("allOf").and_then(Value::as_array) {
            let merged = self.merge_all_of(obj, parts, base)?;
            return self.compile(&Value::Object(merged), base);
        }

        for keyword in ["anyOf", "oneOf"] {
            if let Some(options) = obj.get(keyword).and_then(Value::as_array) {
                return self.compile_union(options, base);
            }
        }

        match obj.get("type") {
            Some(Value::String(kind)) => self.compile_typed(kind, obj, base),
            Some(Value::Array(kinds)) => self.compile_type_list(kinds, obj, base),
            _ => {
                let kind = if ["properties", "patternProperties", "additionalProperties", "required"]
                    .iter()
                    .any(|k| obj.contains_key(*k))
                {
                    "object"
                } else if obj.contains_key("items") || obj.contains_key("prefixItems") {
                    "array"
                } else {
                    return Ok(self.push(Node::Any));
                };
                self.compile_typed(kind, obj, base)
            }
        }
    }

    fn compile_ref(&mut self, reference: &str, base: &Arc<SchemaDocument>) -> Result<NodeId, SchemaError> {
        let resolved = self.schemas.resolve_ref(reference, base)?;
        let key = resolved.key();
        if let Some(id) = self.memo.get(&key) {
            return Ok(*id);
        }
        let slot = self.push(Node::Any);
        self.memo.insert(key, slot);
        let target = resolved.schema().cloned().unwrap_or(Value::Bool(true));
        let inner = self.compile(&target, &resolved.document)?;
        if self.aliases_back(inner, slot) {
            warn!(reference = %reference, "Reference cycle made only of aliases, serializing as plain JSON");
        } else if let Some(node) = self.nodes.get_mut(slot) {
            *node = Node::Alias(inner);
        }
        Ok(slot)
    }

    /// Whether following aliases from `from` leads to `slot`, e.g. two
    /// shared schemas that are nothing but `$ref`s to each other.
    fn aliases_back(&self, from: NodeId, slot: NodeId) -> bool {
        let mut current = from;
        for _ in 0..=self.nodes.len() {
            if current == slot {
                return true;
            }
            match self.nodes.get(current) {
                Some(Node::Alias(target)) => current = *target,
                _ => return false,
            }
        }
        true
    }

    fn compile_union(&mut self, options: &[Value], base: &Arc<SchemaDocument>) -> Result<NodeId, SchemaError> {
        let mut branches = Vec::with_capacity(options.len());
        for option in options {
            let node = self.compile(option, base)?;
            let validator = self
                .schemas
                .bundle_schema(option, base)
                .ok()
                .and_then(|bundled| jsonschema::validator_for(&bundled).ok());
            branches.push(Branch { node, validator });
        }
        Ok(self.push(Node::Union(branches)))
    }

    fn compile_type_list(
        &mut self,
        kinds: &[Value],
        obj: &Map<String, Value>,
        base: &Arc<SchemaDocument>,
    ) -> Result<NodeId, SchemaError> {
        let kinds: Vec<&str> = kinds.iter().filter_map(Value::as_str).collect();
        if let [single] = kinds.as_slice() {
            return self.compile_typed(single, obj, base);
        }
        let mut branches = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let node = self.compile_typed(kind, obj, base)?;
            branches.push(Branch {
                node,
                validator: None,
            });
        }
        Ok(self.push(Node::Union(branches)))
    }

    fn compile_typed(
        &mut self,
        kind: &str,
        obj: &Map<String, Value>,
        base: &Arc<SchemaDocument>,
    ) -> Result<NodeId, SchemaError> {
        let node = match kind {
            "null" => Node::Null,
            "boolean" => Node::Boolean,
            "integer" => Node::Integer,
            "number" => Node::Number,
            "string" => Node::String,
            "object" => Node::Object(self.object_plan(obj, base)?),
            "array" => Node::Array(self.array_plan(obj, base)?),
            other => {
                warn!(schema_type = %other, "Unknown schema type, serializing as plain JSON");
                Node::Any
            }
        };
        Ok(self.push(node))
    }

    fn object_plan(&mut self, obj: &Map<String, Value>, base: &Arc<SchemaDocument>) -> Result<ObjectPlan, SchemaError> {
        let mut properties = Vec::new();
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (name, sub) in props {
                let node = self.compile(sub, base)?;
                properties.push(PropertyPlan {
                    name: name.clone(),
                    key: format!("{}:", Value::String(name.clone())),
                    node,
                    default: sub.get("default").cloned(),
                });
            }
        }

        let required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut patterns = Vec::new();
        if let Some(map) = obj.get("patternProperties").and_then(Value::as_object) {
            for (pattern, sub) in map {
                match Regex::new(pattern) {
                    Ok(re) => {
                        let node = self.compile(sub, base)?;
                        patterns.push((re, node));
                    }
                    Err(err) => {
                        warn!(pattern = %pattern, error = %err, "Ignoring invalid patternProperties regex");
                    }
                }
            }
        }

        let additional = match obj.get("additionalProperties") {
            Some(Value::Bool(true)) => Additional::Any,
            Some(sub @ Value::Object(_)) => Additional::Schema(self.compile(sub, base)?),
            _ => Additional::Drop,
        };

        Ok(ObjectPlan {
            properties,
            required,
            patterns,
            additional,
        })
    }

    fn array_plan(&mut self, obj: &Map<String, Value>, base: &Arc<SchemaDocument>) -> Result<ArrayPlan, SchemaError> {
        let mut prefix = Vec::new();
        let tuple = obj
            .get("prefixItems")
            .and_then(Value::as_array)
            .or_else(|| obj.get("items").and_then(Value::as_array));
        for sub in tuple.into_iter().flatten() {
            prefix.push(self.compile(sub, base)?);
        }

        let rest = if obj.get("items").is_some_and(Value::is_array) {
            obj.get("additionalItems")
        } else {
            obj.get("items")
        };
        let items = match rest {
            Some(sub @ Value::Object(_)) => self.compile(sub, base)?,
            _ => self.push(Node::Any),
        };
        Ok(ArrayPlan { prefix, items })
    }

    /// Flatten `allOf` into one schema. Parts are bundled first so the
    /// merged result has no references left that depend on their origin.
    fn merge_all_of(
        &self,
        obj: &Map<String, Value>,
        parts: &[Value],
        base: &Arc<SchemaDocument>,
    ) -> Result<Map<String, Value>, SchemaError> {
        let mut merged = obj.clone();
        merged.remove("allOf");
        for part in parts {
            if let Value::Object(part) = self.schemas.bundle_schema(part, base)? {
                merge_schema(&mut merged, &part);
            }
        }
        Ok(merged)
    }
}

fn merge_schema(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (key.as_str(), target.get_mut(key)) {
            ("properties" | "patternProperties", Some(Value::Object(existing))) => {
                if let Value::Object(incoming) = value {
                    for (name, sub) in incoming {
                        existing.entry(name.clone()).or_insert_with(|| sub.clone());
                    }
                }
            }
            ("required", Some(Value::Array(existing))) => {
                if let Value::Array(incoming) = value {
                    for name in incoming {
                        if !existing.contains(name) {
                            existing.push(name.clone());
                        }
                    }
                }
            }
            (_, Some(_)) => {}
            (_, None) => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn write_json(value: &Value, out: &mut Vec<u8>) -> Result<(), SerializeError> {
    serde_json::to_writer(&mut *out, value)?;
    Ok(())
}

fn write_str(text: &str, out: &mut Vec<u8>) -> Result<(), SerializeError> {
    serde_json::to_writer(&mut *out, text)?;
    Ok(())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn integer_string(value: f64) -> String {
    if value.abs() < 9.0e18 {
        // `as` saturates; -0.0 becomes 0
        (value as i64).to_string()
    } else {
        format!("{value:.0}")
    }
}

fn float_string(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e21 {
        integer_string(value)
    } else {
        value.to_string()
    }
}

fn number_text(value: &Value) -> Result<String, SerializeError> {
    let float = match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return Ok(n.to_string());
            }
            n.as_f64()
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match float.filter(|f| f.is_finite()) {
        Some(f) => Ok(float_string(f)),
        None => Err(SerializeError::new(format!(
            "The value \"{}\" cannot be converted to a number.",
            js_string(value)
        ))),
    }
}

/// String conversion with the conventions of JavaScript's `String(value)`.
pub(crate) fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !(n.is_i64() || n.is_u64()) => float_string(f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan(schema: Value) -> Plan {
        plan_with(schema, SerializerOptions::default())
    }

    fn plan_with(schema: Value, options: SerializerOptions) -> Plan {
        let doc = Arc::new(SchemaDocument::inline(schema.clone()));
        Plan::build(&schema, &doc, &SchemaSet::default(), options).unwrap()
    }

    #[test]
    fn test_strips_undeclared_properties() {
        let p = plan(json!({
            "type": "object",
            "properties": { "name": { "type": "string" }, "work": { "type": "string" } }
        }));
        let out = p.serialize(&json!({"name": "Foo", "work": "Bar", "nick": "Boo"})).unwrap();
        assert_eq!(out, r#"{"name":"Foo","work":"Bar"}"#);
    }

    #[test]
    fn test_property_order_follows_schema() {
        let p = plan(json!({
            "type": "object",
            "properties": { "b": { "type": "integer" }, "a": { "type": "integer" } }
        }));
        assert_eq!(p.serialize(&json!({"a": 1, "b": 2})).unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn test_required_and_default() {
        let p = plan(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "role": { "type": "string", "default": "user" }
            },
            "required": ["name", "role"]
        }));
        assert_eq!(
            p.serialize(&json!({"name": "x"})).unwrap(),
            r#"{"name":"x","role":"user"}"#
        );
        let err = p.serialize(&json!({"no": "thing"})).unwrap_err();
        assert_eq!(err.message(), "\"name\" is required!");
    }

    #[test]
    fn test_string_coercion() {
        let p = plan(json!({ "type": "string" }));
        assert_eq!(p.serialize(&json!({"boxId": 1})).unwrap(), r#""[object Object]""#);
        assert_eq!(p.serialize(&json!(12)).unwrap(), r#""12""#);
        assert_eq!(p.serialize(&json!(null)).unwrap(), r#""""#);
        assert_eq!(p.serialize(&json!("a\"b")).unwrap(), r#""a\"b""#);
    }

    #[test]
    fn test_integer_rounding() {
        let trunc = plan(json!({ "type": "integer" }));
        assert_eq!(trunc.serialize(&json!(4.7)).unwrap(), "4");
        let ceil = plan_with(
            json!({ "type": "integer" }),
            SerializerOptions {
                rounding: Rounding::Ceil,
            },
        );
        assert_eq!(ceil.serialize(&json!(4.2)).unwrap(), "5");
        assert_eq!(ceil.serialize(&json!("7")).unwrap(), "7");
        let err = ceil.serialize(&json!("abc")).unwrap_err();
        assert_eq!(err.message(), "The value \"abc\" cannot be converted to an integer.");
    }

    #[test]
    fn test_number_formatting() {
        let p = plan(json!({ "type": "number" }));
        assert_eq!(p.serialize(&json!(1.0)).unwrap(), "1");
        assert_eq!(p.serialize(&json!(1.5)).unwrap(), "1.5");
        assert_eq!(p.serialize(&json!(true)).unwrap(), "1");
    }

    #[test]
    fn test_const_ignores_input() {
        let p = plan(json!({ "const": "Processing exclusive content" }));
        assert_eq!(
            p.serialize(&json!({"content": "interesting content"})).unwrap(),
            r#""Processing exclusive content""#
        );
    }

    #[test]
    fn test_nullable_and_type_lists() {
        let nullable = plan(json!({ "type": "string", "nullable": true }));
        assert_eq!(nullable.serialize(&json!(null)).unwrap(), "null");
        assert_eq!(nullable.serialize(&json!("x")).unwrap(), r#""x""#);

        let list = plan(json!({ "type": ["integer", "string"] }));
        assert_eq!(list.serialize(&json!("x")).unwrap(), r#""x""#);
        assert_eq!(list.serialize(&json!(3)).unwrap(), "3");
    }

    #[test]
    fn test_any_of_picks_matching_branch() {
        let p = plan(json!({
            "anyOf": [
                { "type": "object", "properties": { "a": { "type": "string" } }, "required": ["a"] },
                { "type": "object", "properties": { "b": { "type": "string" } }, "required": ["b"] }
            ]
        }));
        assert_eq!(p.serialize(&json!({"b": "x", "c": 1})).unwrap(), r#"{"b":"x"}"#);
    }

    #[test]
    fn test_all_of_merges_properties() {
        let p = plan(json!({
            "allOf": [
                { "type": "object", "properties": { "a": { "type": "string" } } },
                { "properties": { "b": { "type": "integer" } }, "required": ["b"] }
            ]
        }));
        assert_eq!(p.serialize(&json!({"a": "x", "b": 2, "c": 3})).unwrap(), r#"{"a":"x","b":2}"#);
        assert!(p.serialize(&json!({"a": "x"})).is_err());
    }

    #[test]
    fn test_additional_and_pattern_properties() {
        let p = plan(json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "patternProperties": { "^x-": { "type": "string" } },
            "additionalProperties": false
        }));
        assert_eq!(
            p.serialize(&json!({"id": 1, "x-tag": 5, "other": true})).unwrap(),
            r#"{"id":1,"x-tag":"5"}"#
        );

        let open = plan(json!({ "type": "object", "additionalProperties": true }));
        assert_eq!(open.serialize(&json!({"k": [1]})).unwrap(), r#"{"k":[1]}"#);
    }

    #[test]
    fn test_recursive_ref_builds_finite_plan() {
        let schema = json!({
            "$id": "http://example.com/tree",
            "type": "object",
            "properties": {
                "value": { "type": "integer" },
                "children": { "type": "array", "items": { "$ref": "#" } }
            }
        });
        let p = plan(schema);
        assert!(p.len() < 16);
        let out = p
            .serialize(&json!({"value": 1, "children": [{"value": 2, "children": [], "x": 0}]}))
            .unwrap();
        assert_eq!(out, r#"{"value":1,"children":[{"value":2,"children":[]}]}"#);
    }

    #[test]
    fn test_schema_without_keywords_is_plain_json() {
        let p = plan(json!({ "description": "anything" }));
        assert_eq!(p.serialize(&json!({"a": [1, "b"]})).unwrap(), r#"{"a":[1,"b"]}"#);
    }

    #[test]
    fn test_array_rejects_non_array() {
        let p = plan(json!({ "type": "array", "items": { "type": "integer" } }));
        assert_eq!(p.serialize(&json!([1, 2.9])).unwrap(), "[1,2]");
        assert!(p.serialize(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_alias_only_cycle_is_plain_json() {
        let mut store = crate::schema::SchemaStore::new();
        store.register(json!({ "$id": "a", "$ref": "b#" })).unwrap();
        store.register(json!({ "$id": "b", "$ref": "a#" })).unwrap();
        let set = SchemaSet::from_stores([&store], 1);
        let schema = json!({ "$ref": "a#" });
        let doc = Arc::new(SchemaDocument::inline(schema.clone()));
        let p = Plan::build(&schema, &doc, &set, SerializerOptions::default()).unwrap();
        assert_eq!(p.serialize(&json!({"x": 1})).unwrap(), r#"{"x":1}"#);
    }

    #[test]
    fn test_self_selecting_union_fails_instead_of_overflowing() {
        let p = plan(json!({ "$id": "http://example.com/loop", "anyOf": [{ "$ref": "#" }] }));
        let err = p.serialize(&json!({"x": 1})).unwrap_err();
        assert_eq!(err.message(), "Maximum serialization depth of 256 exceeded.");
    }
}

use super::plan::Plan;
use super::{serializer, CompileContext, Payload, SerializeFn, SerializerCompiler, SerializerOptions};
use crate::error::BoxError;
use std::sync::Arc;
use tracing::debug;

/// The built-in compiler: a schema-driven JSON writer.
///
/// Declared properties are written in schema order and undeclared ones are
/// dropped unless `additionalProperties` allows them. Schemas it cannot make
/// sense of serialize the value as plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCompiler {
    options: SerializerOptions,
}

impl DefaultCompiler {
    pub fn new(options: SerializerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> SerializerOptions {
        self.options
    }
}

impl SerializerCompiler for DefaultCompiler {
    fn compile(&self, ctx: &CompileContext<'_>) -> Result<SerializeFn, BoxError> {
        let plan = Plan::build(ctx.schema, ctx.document, ctx.schemas, self.options)?;
        debug!(
            method = %ctx.method,
            url = %ctx.url,
            http_status = %ctx.http_status,
            content_type = ?ctx.content_type,
            plan_nodes = plan.len(),
            "Built serialization plan"
        );
        let plan = Arc::new(plan);
        Ok(serializer(move |value| plan.serialize(value).map(Payload::Text)))
    }

    fn name(&self) -> &str {
        "default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaDocument, SchemaSet, SchemaStore};
    use serde_json::{json, Value};

    fn compile(set: &SchemaSet, schema: Value) -> SerializeFn {
        let document = Arc::new(SchemaDocument::inline(schema.clone()));
        let ctx = CompileContext {
            schema: &schema,
            method: "GET",
            url: "/",
            http_status: "200",
            content_type: None,
            schemas: set,
            document: &document,
        };
        DefaultCompiler::default().compile(&ctx).unwrap()
    }

    #[test]
    fn test_shared_ref_drops_unknown_fields() {
        let mut store = SchemaStore::new();
        store
            .register(json!({
                "$id": "test",
                "type": "object",
                "properties": { "id": { "type": "number" } }
            }))
            .unwrap();
        let set = SchemaSet::from_stores([&store], 1);
        let f = compile(&set, json!({ "type": "array", "items": { "$ref": "test" } }));
        let out = f(&json!([{ "id": 1 }, { "id": 2 }, { "what": "is this" }])).unwrap();
        assert_eq!(out, Payload::Text(r#"[{"id":1},{"id":2},{}]"#.into()));
    }

    #[test]
    fn test_mutual_document_references() {
        let mut store = SchemaStore::new();
        store
            .register(json!({
                "$id": "http://example.com/asset.json",
                "type": "object",
                "required": ["id", "model", "location"],
                "properties": {
                    "id": { "type": "string", "format": "uuid" },
                    "model": { "type": "string" },
                    "location": { "$ref": "http://example.com/point.json#" }
                },
                "definitions": {
                    "inner": { "$id": "#innerId", "type": "string", "format": "email" }
                }
            }))
            .unwrap();
        store
            .register(json!({
                "$id": "http://example.com/point.json",
                "type": "object",
                "required": ["latitude", "longitude"],
                "properties": {
                    "email": { "$ref": "http://example.com/asset.json#/definitions/inner" },
                    "latitude": { "type": "number" },
                    "longitude": { "type": "number" }
                }
            }))
            .unwrap();
        let set = SchemaSet::from_stores([&store], 1);
        let f = compile(
            &set,
            json!({
                "$id": "http://example.com/locations.json",
                "type": "array",
                "items": { "$ref": "http://example.com/asset.json#" }
            }),
        );
        let location = json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "model": "mod",
            "location": { "latitude": 10, "longitude": 10, "email": "foo@bar.it" }
        });
        let mut noisy = location.clone();
        noisy["serializer"] = json!("remove me");
        let out = f(&json!([noisy])).unwrap();
        let parsed: Value = serde_json::from_str(&out.to_text()).unwrap();
        assert_eq!(parsed, json!([location]));
    }

    #[test]
    fn test_anchor_refs_inside_route_schema() {
        let mut store = SchemaStore::new();
        store
            .register(json!({
                "$id": "http://foo/test",
                "type": "object",
                "properties": { "id": { "type": "number" } }
            }))
            .unwrap();
        let set = SchemaSet::from_stores([&store], 1);
        let f = compile(
            &set,
            json!({
                "$id": "http://foo/user",
                "type": "object",
                "definitions": {
                    "address": {
                        "$id": "#address",
                        "type": "object",
                        "properties": { "city": { "type": "string" } }
                    }
                },
                "properties": {
                    "test": { "$ref": "http://foo/test#" },
                    "address": { "$ref": "#address" }
                },
                "required": ["address", "test"]
            }),
        );
        let out = f(&json!({
            "address": { "city": "New Node" },
            "test": { "id": 7 },
            "removeThis": "it should not be serialized"
        }))
        .unwrap();
        assert_eq!(
            out.to_text(),
            r#"{"test":{"id":7},"address":{"city":"New Node"}}"#
        );
    }

    #[test]
    fn test_unresolved_ref_fails_compilation() {
        let set = SchemaSet::default();
        let schema = json!({ "type": "object", "properties": { "x": { "$ref": "nowhere#" } } });
        let document = Arc::new(SchemaDocument::inline(schema.clone()));
        let ctx = CompileContext {
            schema: &schema,
            method: "GET",
            url: "/",
            http_status: "200",
            content_type: None,
            schemas: &set,
            document: &document,
        };
        let err = DefaultCompiler::default().compile(&ctx).err().unwrap();
        assert!(err.to_string().contains("nowhere#"));
    }
}

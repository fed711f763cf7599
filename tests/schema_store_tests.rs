#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Shared schema registration and reference resolution
//!
//! # Test Coverage
//!
//! - Missing and duplicate `$id`s rejected with stable codes
//! - Mutually referencing documents resolve regardless of registration order
//! - Fingerprints depend on content only
//! - Recursive schemas bundle without looping
//! - Engine-level schema registration errors

use brrtserializer::schema::{SchemaDocument, SchemaSet, SchemaStore};
use brrtserializer::{Engine, ErrorCode, Reply, ReplyState, RouteDeclaration, SchemaError};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_register_requires_unique_id() {
    let mut store = SchemaStore::new();
    let err = store.register(json!({ "type": "object" })).unwrap_err();
    assert_eq!(err, SchemaError::MissingId);
    assert_eq!(err.code().as_str(), "ERR_SCH_MISSING_ID");

    store.register(json!({ "$id": "dup", "type": "string" })).unwrap();
    let err = store.register(json!({ "$id": "dup", "type": "number" })).unwrap_err();
    assert_eq!(err.to_string(), "Schema with id 'dup' already declared!");
    assert_eq!(err.code(), ErrorCode::SchemaAlreadyPresent);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_forward_references_resolve() {
    let mut store = SchemaStore::new();
    // `a` refers to `b` before `b` exists.
    store
        .register(json!({ "$id": "a", "type": "object", "properties": { "b": { "$ref": "b#" } } }))
        .unwrap();
    store
        .register(json!({ "$id": "b", "type": "object", "properties": { "a": { "$ref": "a#" } } }))
        .unwrap();
    let set = SchemaSet::from_stores([&store], 1);

    let a = Arc::clone(set.document("a").unwrap());
    set.check_refs(&a).unwrap();
    let resolved = set.resolve_ref("b#/properties/a", &a).unwrap();
    assert_eq!(resolved.schema(), Some(&json!({ "$ref": "a#" })));
}

#[test]
fn test_fingerprint_ignores_registration_order() {
    let one = json!({ "$id": "one", "type": "string" });
    let two = json!({ "$id": "two", "type": "integer" });

    let mut first = SchemaStore::new();
    first.register(one.clone()).unwrap();
    first.register(two.clone()).unwrap();
    let mut second = SchemaStore::new();
    second.register(two).unwrap();
    second.register(one).unwrap();

    let a = SchemaSet::from_stores([&first], 1).fingerprint();
    let b = SchemaSet::from_stores([&second], 2).fingerprint();
    assert_eq!(a, b);
    assert_eq!(a.len(), 16);

    let mut third = SchemaStore::new();
    third.register(json!({ "$id": "one", "type": "number" })).unwrap();
    assert_ne!(a, SchemaSet::from_stores([&third], 1).fingerprint());
}

#[test]
fn test_recursive_schema_bundles() {
    let mut store = SchemaStore::new();
    store
        .register(json!({
            "$id": "node",
            "type": "object",
            "properties": {
                "value": { "type": "integer" },
                "next": { "$ref": "node#" }
            }
        }))
        .unwrap();
    let set = SchemaSet::from_stores([&store], 1);
    let inline = Arc::new(SchemaDocument::inline(json!({ "$ref": "node#" })));
    let bundled = set.bundle(&inline).unwrap();
    assert_eq!(bundled["properties"]["value"], json!({ "type": "integer" }));
    assert!(bundled["properties"]["next"].is_object());
}

#[test]
fn test_recursive_schema_serializes() {
    let mut engine = Engine::default();
    engine
        .register_schema(
            engine.root(),
            json!({
                "$id": "node",
                "type": "object",
                "properties": {
                    "value": { "type": "integer" },
                    "next": { "$ref": "node#" }
                }
            }),
        )
        .unwrap();
    let route = engine
        .add_route(
            engine.root(),
            RouteDeclaration::new("GET", "/list").with_response(json!({ "200": { "$ref": "node#" } })),
        )
        .unwrap();
    engine.ready().unwrap();

    let value = json!({ "value": 1, "x": 0, "next": { "value": 2, "next": { "value": 3, "y": true } } });
    let sent = engine.send(route, Reply::new(value)).unwrap();
    assert_eq!(
        sent.text(),
        r#"{"value":1,"next":{"value":2,"next":{"value":3}}}"#
    );
}

#[test]
fn test_engine_rejects_schema_without_id() {
    let mut engine = Engine::default();
    let err = engine
        .register_schema(engine.root(), json!({ "type": "object" }))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SchemaMissingId);
    assert_eq!(err.to_string(), "Missing schema $id property");
}

#[test]
fn test_alias_cycle_serves_plain_json() {
    let mut engine = Engine::default();
    engine
        .register_schema(engine.root(), json!({ "$id": "a", "$ref": "b#" }))
        .unwrap();
    engine
        .register_schema(engine.root(), json!({ "$id": "b", "$ref": "a#" }))
        .unwrap();
    let route = engine
        .add_route(
            engine.root(),
            RouteDeclaration::new("GET", "/loop").with_response(json!({ "200": { "$ref": "a#" } })),
        )
        .unwrap();
    engine.ready().unwrap();

    let sent = engine.send(route, Reply::new(json!({ "x": 1 }))).unwrap();
    assert_eq!(sent.status, 200);
    assert_eq!(sent.text(), r#"{"x":1}"#);
}

#[test]
fn test_self_selecting_union_becomes_error_reply() {
    let mut engine = Engine::default();
    engine
        .register_schema(engine.root(), json!({ "$id": "loop", "anyOf": [{ "$ref": "loop#" }] }))
        .unwrap();
    let route = engine
        .add_route(
            engine.root(),
            RouteDeclaration::new("GET", "/loop").with_response(json!({ "200": { "$ref": "loop#" } })),
        )
        .unwrap();
    engine.ready().unwrap();

    let sent = engine.send(route, Reply::new(json!({ "x": 1 }))).unwrap();
    assert_eq!(sent.status, 500);
    assert_eq!(sent.outcome(), ReplyState::SentError);
    assert!(sent.text().contains("Maximum serialization depth"), "{}", sent.text());
}

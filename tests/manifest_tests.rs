#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Manifest loading and scope-level schema visibility
//!
//! # Test Coverage
//!
//! - JSON and YAML manifests build the same engine
//! - Child scopes see their parent's shared schemas
//! - Sibling scopes do not see each other's schemas
//! - Duplicate schema ids are rejected along a scope chain
//! - Input schemas declared in a manifest are validated on dispatch

mod common;

use brrtserializer::manifest::Manifest;
use brrtserializer::{EngineConfig, EngineError, ErrorCode, Reply, RequestInput};
use common::temp_files;
use serde_json::json;

const YAML: &str = r#"
name: shop
schemas:
  - $id: item
    type: object
    properties:
      id: { type: integer }
      title: { type: string }
routes:
  - method: get
    url: /health
    response:
      "200": { type: object, properties: { ok: { type: boolean } } }
scopes:
  - prefix: /v1
    routes:
      - method: POST
        url: /items
        body:
          type: object
          required: [title]
          properties:
            title: { type: string }
        response:
          "201": { $ref: "item#" }
"#;

#[test]
fn test_yaml_and_json_manifests_agree() {
    let yaml_file = temp_files::manifest(YAML, "yaml");
    let from_yaml = Manifest::from_path(yaml_file.path()).unwrap();

    let as_json = serde_json::to_string(&from_yaml).unwrap();
    let json_file = temp_files::manifest(&as_json, "json");
    let from_json = Manifest::from_path(json_file.path()).unwrap();

    assert_eq!(from_yaml, from_json);
    assert_eq!(from_yaml.name.as_deref(), Some("shop"));
    assert_eq!(from_yaml.route_count(), 2);
}

#[test]
fn test_manifest_engine_serves_routes() {
    let manifest = Manifest::from_yaml(YAML).unwrap();
    let mut engine = manifest.into_engine(EngineConfig::default()).unwrap();
    let report = engine.ready().unwrap();
    assert_eq!(report.routes, 2);
    assert_eq!(report.validators, 1);

    let health = engine.find_route("GET", "/health").unwrap();
    let sent = engine
        .send(health, Reply::new(json!({ "ok": true, "uptime": 12 })))
        .unwrap();
    assert_eq!(sent.text(), r#"{"ok":true}"#);

    let create = engine.find_route("post", "/v1/items").unwrap();
    let input = RequestInput::default().with_body(json!({ "title": "lamp" }));
    let sent = engine
        .dispatch(create, &input, |req| {
            let mut item = req.body.clone().unwrap();
            item["id"] = json!(7);
            item["secret"] = json!("hidden");
            Reply::new(item).code(201)
        })
        .unwrap();
    assert_eq!(sent.status, 201);
    assert_eq!(sent.json().unwrap(), json!({ "id": 7, "title": "lamp" }));

    let sent = engine
        .dispatch(create, &RequestInput::default().with_body(json!({})), |_| {
            Reply::new(json!({})).code(201)
        })
        .unwrap();
    assert_eq!(sent.status, 400);
    assert_eq!(sent.json().unwrap()["code"], "ERR_VALIDATION");
}

#[test]
fn test_sibling_scope_schema_not_visible() {
    let manifest = Manifest::from_json(
        &json!({
            "scopes": [
                {
                    "prefix": "/a",
                    "schemas": [{ "$id": "only-a", "type": "string" }],
                    "routes": [{ "method": "GET", "url": "/", "response": { "200": { "$ref": "only-a#" } } }]
                },
                {
                    "prefix": "/b",
                    "routes": [{ "method": "GET", "url": "/", "response": { "200": { "$ref": "only-a#" } } }]
                }
            ]
        })
        .to_string(),
    )
    .unwrap();
    let mut engine = manifest.into_engine(EngineConfig::default()).unwrap();

    let err = engine.ready().unwrap_err();
    assert_eq!(err.code(), ErrorCode::SchemaRefNotFound);
    assert!(err.to_string().contains("/b"), "{err}");
}

#[test]
fn test_duplicate_schema_along_chain_rejected() {
    let manifest = Manifest::from_json(
        &json!({
            "schemas": [{ "$id": "shared", "type": "object" }],
            "scopes": [
                { "prefix": "/x", "schemas": [{ "$id": "shared", "type": "string" }] }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let err = manifest.into_engine(EngineConfig::default()).unwrap_err();
    let engine_err = err
        .downcast_ref::<EngineError>()
        .expect("engine error behind the context");
    assert_eq!(engine_err.code(), ErrorCode::SchemaAlreadyPresent);
}

#[test]
fn test_missing_manifest_file_names_path() {
    let err = Manifest::from_path("/definitely/not/here.yaml").unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
}

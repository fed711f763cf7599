//! Unit tests for CLI commands

use crate::cli::{run_cli, Cli, Commands};
use crate::compiler::Rounding;
use crate::response::ContentFallthrough;
use clap::Parser;
use std::io::Write;

const MANIFEST: &str = r#"
schemas:
  - $id: person
    type: object
    properties:
      name: { type: string }
      age: { type: integer }
routes:
  - method: GET
    url: /
    response:
      "2xx": { $ref: "person#" }
      "5xx":
        type: object
        properties:
          statusCode: { type: integer }
          message: { type: string }
scopes:
  - prefix: /v1
    routes:
      - method: POST
        url: /items
        response:
          "201":
            content:
              application/json:
                schema: { type: object, properties: { id: { type: integer } } }
"#;

fn manifest_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn run(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(args)?;
    let mut out = Vec::new();
    run_cli(&cli, &mut out)?;
    Ok(String::from_utf8(out)?)
}

#[test]
fn test_render_command_parses() {
    let cli = Cli::try_parse_from([
        "brrts",
        "render",
        "--manifest",
        "routes.yaml",
        "--url",
        "/",
        "--value",
        "{}",
        "--rounding",
        "ceil",
    ])
    .unwrap();
    assert_eq!(cli.rounding, Some(Rounding::Ceil));
    match cli.command {
        Commands::Render {
            method,
            status,
            content_type,
            ..
        } => {
            assert_eq!(method, "GET");
            assert_eq!(status, 200);
            assert!(content_type.is_none());
        }
        _ => panic!("Expected Render command"),
    }
}

#[test]
fn test_invalid_fallthrough_rejected() {
    let result = Cli::try_parse_from([
        "brrts",
        "--content-fallthrough",
        "sideways",
        "check",
        "--manifest",
        "x.yaml",
    ]);
    assert!(result.is_err());

    let cli = Cli::try_parse_from([
        "brrts",
        "--content-fallthrough",
        "next",
        "check",
        "--manifest",
        "x.yaml",
    ])
    .unwrap();
    assert_eq!(cli.content_fallthrough, Some(ContentFallthrough::Next));
    assert_eq!(cli.engine_config().content_fallthrough, ContentFallthrough::Next);
}

#[test]
fn test_check_reports_counts() {
    let file = manifest_file(MANIFEST);
    let path = file.path().to_str().unwrap();
    let out = run(&["brrts", "check", "--manifest", path]).unwrap();
    assert!(out.contains("2 route(s), 3 serializer(s), 0 validator(s)"));
}

#[test]
fn test_check_fails_on_missing_content_schema() {
    let file = manifest_file(
        r#"
routes:
  - method: GET
    url: /
    response:
      "200":
        content:
          type: {}
"#,
    );
    let path = file.path().to_str().unwrap();
    let err = run(&["brrts", "check", "--manifest", path]).unwrap_err();
    assert!(err.to_string().contains("1 route(s) failed"));
}

#[test]
fn test_routes_lists_prefixed_urls() {
    let file = manifest_file(MANIFEST);
    let path = file.path().to_str().unwrap();
    let out = run(&["brrts", "routes", "--manifest", path]).unwrap();
    assert!(out.contains("GET     /\n"));
    assert!(out.contains("POST    /v1/items\n"));
}

#[test]
fn test_render_strips_undeclared_properties() {
    let file = manifest_file(MANIFEST);
    let path = file.path().to_str().unwrap();
    let out = run(&[
        "brrts",
        "render",
        "--manifest",
        path,
        "--url",
        "/",
        "--value",
        r#"{"name":"Foo","age":"7","nick":"Boo"}"#,
    ])
    .unwrap();
    assert_eq!(
        out,
        "200 application/json; charset=utf-8\n{\"name\":\"Foo\",\"age\":7}\n"
    );
}

#[test]
fn test_render_unknown_route() {
    let file = manifest_file(MANIFEST);
    let path = file.path().to_str().unwrap();
    let err = run(&[
        "brrts", "render", "--manifest", path, "--url", "/nope", "--value", "{}",
    ])
    .unwrap_err();
    assert!(err.to_string().contains("No route GET /nope"));
}

#[test]
fn test_render_rejects_invalid_json_value() {
    let file = manifest_file(MANIFEST);
    let path = file.path().to_str().unwrap();
    let err = run(&[
        "brrts", "render", "--manifest", path, "--url", "/", "--value", "{nope",
    ])
    .unwrap_err();
    assert!(err.to_string().contains("--value must be valid JSON"));
}

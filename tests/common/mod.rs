#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod fixtures {
    use brrtserializer::{
        compiler, serializer, CompileContext, Engine, Payload, RouteDeclaration, RouteId,
        SharedCompiler,
    };
    use serde_json::{json, Value};

    /// `{name, work}` object used by most scenarios.
    pub fn name_work() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "work": { "type": "string" }
            }
        })
    }

    /// Engine with a single route in the root scope, already ready.
    pub fn ready_engine(declaration: RouteDeclaration) -> (Engine, RouteId) {
        let mut engine = Engine::default();
        let route = engine.add_route(engine.root(), declaration).unwrap();
        engine.ready().unwrap();
        (engine, route)
    }

    /// Compiler that ignores the schema and writes the value as JSON.
    pub fn stringify_compiler() -> SharedCompiler {
        compiler(|_: &CompileContext<'_>| {
            Ok(serializer(|value: &Value| Ok(Payload::Text(value.to_string()))))
        })
    }

    /// Compiler whose serializers always write `output`.
    pub fn constant_compiler(output: &'static str) -> SharedCompiler {
        compiler(move |_: &CompileContext<'_>| {
            Ok(serializer(move |_: &Value| Ok(Payload::Text(output.to_string()))))
        })
    }
}

pub mod temp_files {
    use std::io::Write;

    /// Write `content` to a temporary file ending in `.{ext}`.
    pub fn manifest(content: &str, ext: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("brrts_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }
}

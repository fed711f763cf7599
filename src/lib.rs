//! # brrtserializer
//!
//! **brrtserializer** turns outgoing reply values into bytes under the control of
//! per-route, per-status, per-content-type JSON schemas. Every route can declare a
//! `response` map; the engine picks the schema matching the outgoing status and content
//! type, compiles it once into a serializer and reuses it for every reply.
//!
//! ## Architecture
//!
//! - **[`schema`]** - Shared schema documents, `$ref` resolution and bundling
//! - **[`response`]** - Status selectors (`200`, `2xx`, `default`) and content maps
//! - **[`compiler`]** - The [`SerializerCompiler`](compiler::SerializerCompiler) seam and the
//!   built-in schema-driven JSON compiler
//! - **`scope`** - Encapsulated scopes carrying compilers, error handlers and schemas
//! - **[`serializer_cache`]** - Compiled serializers keyed by route, status and content type
//! - **[`reply`]** - The reply pipeline and its error branch
//! - **[`validator`]** - Input validation producing `400` errors
//! - **[`engine`]** - The facade tying all of the above together
//! - **[`manifest`]** - Routes and schemas declared in YAML/JSON
//!
//! ### Reply Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Handler
//!     participant Pipeline as reply pipeline
//!     participant Map as response map
//!     participant Cache as serializer cache
//!     participant ErrorHandler
//!
//!     Handler->>Pipeline: Reply(value, status, content type)
//!     alt reply serializer override
//!         Pipeline-->>Handler: raw payload (SentRaw)
//!     else schema pipeline
//!         Pipeline->>Map: resolve(status, content type)
//!         Map-->>Pipeline: slot or none
//!         Pipeline->>Cache: get_or_compile(route, selector, content type)
//!         Cache-->>Pipeline: serializer
//!         Pipeline->>Pipeline: serialize (Sent)
//!     end
//!     opt serializer fails
//!         Pipeline->>ErrorHandler: handle(error)
//!         ErrorHandler-->>Pipeline: status + projection
//!         Pipeline->>Pipeline: serialize with error status schema (SentError)
//!         Pipeline->>Pipeline: fixed fallback on second failure (SentFixedFallback)
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtserializer::{Engine, Reply, RouteDeclaration};
//! use serde_json::json;
//!
//! let mut engine = Engine::default();
//! engine
//!     .register_schema(engine.root(), json!({
//!         "$id": "http://example.com/person",
//!         "type": "object",
//!         "properties": { "name": { "type": "string" } }
//!     }))
//!     .unwrap();
//! let route = engine
//!     .add_route(
//!         engine.root(),
//!         RouteDeclaration::new("GET", "/people/:id").with_response(json!({
//!             "200": { "$ref": "http://example.com/person#" }
//!         })),
//!     )
//!     .unwrap();
//! engine.ready().unwrap();
//!
//! let sent = engine.send(route, Reply::new(json!({ "name": "Ada", "password": "x" }))).unwrap();
//! assert_eq!(sent.text(), r#"{"name":"Ada"}"#);
//! ```
//!
//! ## Configuration
//!
//! See [`runtime_config`] for the `BRRTS_*` environment variables and
//! [`telemetry`] for logging setup.

pub mod cli;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod ids;
pub mod manifest;
pub mod reply;
pub mod response;
pub mod runtime_config;
pub mod schema;
mod scope;
pub mod serializer_cache;
pub mod telemetry;
pub mod validator;

pub use compiler::{
    compiler, serializer, CompileContext, DefaultCompiler, Payload, Rounding, SerializeFn,
    SerializerCompiler, SerializerOptions, SharedCompiler,
};
pub use engine::{Engine, ReadyReport, RouteDeclaration, RouteInfo};
pub use error::{BoxError, BuildError, EngineError, ErrorCode, SchemaError, SerializeError};
pub use ids::{RouteId, ScopeId};
pub use reply::{
    DefaultErrorHandler, ErrorHandler, ErrorReply, HandlerError, Reply, ReplyState, SentResponse,
};
pub use response::{ContentFallthrough, StatusSelector};
pub use runtime_config::EngineConfig;
pub use validator::{InputPart, InputSchemas, RequestInput};

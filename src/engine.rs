//! # Engine
//!
//! The [`Engine`] owns the scope tree, the declared routes and the compiled
//! serializer cache. Its life has two phases:
//!
//! 1. **Registration**: scopes, shared schemas, compilers, error handlers and
//!    routes are declared.
//! 2. **Serving**: [`Engine::ready`] validates every route, compiles every
//!    declared (status selector, content type) pair and every input
//!    validator. After that, [`Engine::serialize`], [`Engine::send`] and
//!    [`Engine::dispatch`] only read.
//!
//! Shared schemas may still be registered after `ready`; routes whose
//! visible schema set changed get their serializers rebuilt on next use.
//!
//! ## Example
//!
//! ```rust
//! use brrtserializer::engine::{Engine, RouteDeclaration};
//! use brrtserializer::reply::Reply;
//! use serde_json::json;
//!
//! let mut engine = Engine::default();
//! let route = engine
//!     .add_route(
//!         engine.root(),
//!         RouteDeclaration::new("GET", "/").with_response(json!({
//!             "2xx": {
//!                 "type": "object",
//!                 "properties": { "name": { "type": "string" }, "work": { "type": "string" } }
//!             }
//!         })),
//!     )
//!     .unwrap();
//! engine.ready().unwrap();
//!
//! let sent = engine
//!     .send(route, Reply::new(json!({ "name": "Foo", "work": "Bar", "nick": "Boo" })))
//!     .unwrap();
//! assert_eq!(sent.status, 200);
//! assert_eq!(sent.text(), r#"{"name":"Foo","work":"Bar"}"#);
//! ```

use crate::compiler::{
    CompileContext, DefaultCompiler, Payload, SerializeFn, SerializerOptions, SharedCompiler,
};
use crate::error::{BuildError, EngineError, SerializeError};
use crate::ids::{RouteId, ScopeId};
use crate::reply::{
    generic_payload, DefaultErrorHandler, ErrorHandler, ErrorObserver, HandlerError, Reply,
    ReplyPipeline, ReplySerializer, SentResponse, SerializerLookup,
};
use crate::response::{ResponseSchemaMap, SchemaSlot};
use crate::runtime_config::EngineConfig;
use crate::schema::{SchemaDocument, SchemaSet};
use crate::scope::{join_prefix, ScopeTree};
use crate::serializer_cache::{ArtifactKey, SchemaSetVersion, SerializerCache};
use crate::validator::{InputSchemas, InputValidators, RequestInput, ValidationIssue};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// A route as declared by the application.
#[derive(Clone, Default)]
pub struct RouteDeclaration {
    /// HTTP method; stored uppercased
    pub method: String,
    /// URL pattern relative to the scope prefix
    pub url: String,
    /// The `response` map: status selector -> schema or content map
    pub response: Option<Value>,
    /// Input schemas checked before the handler runs
    pub input: InputSchemas,
    /// Compiler used for this route only
    pub serializer_compiler: Option<SharedCompiler>,
}

impl RouteDeclaration {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_body(mut self, schema: Value) -> Self {
        self.input.body = Some(schema);
        self
    }

    pub fn with_querystring(mut self, schema: Value) -> Self {
        self.input.querystring = Some(schema);
        self
    }

    pub fn with_params(mut self, schema: Value) -> Self {
        self.input.params = Some(schema);
        self
    }

    pub fn with_headers(mut self, schema: Value) -> Self {
        self.input.headers = Some(schema);
        self
    }

    pub fn with_serializer_compiler(mut self, compiler: SharedCompiler) -> Self {
        self.serializer_compiler = Some(compiler);
        self
    }
}

impl fmt::Debug for RouteDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDeclaration")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("response", &self.response)
            .field("input", &self.input)
            .field(
                "serializer_compiler",
                &self.serializer_compiler.as_ref().map(|c| c.name().to_string()),
            )
            .finish()
    }
}

/// Public view of a registered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub id: RouteId,
    pub scope: ScopeId,
    pub method: String,
    /// Full URL pattern, scope prefixes included
    pub url: String,
    /// Whether the ready pass has prepared the route
    pub prepared: bool,
}

/// Summary of a ready pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadyReport {
    pub routes: usize,
    pub serializers: usize,
    pub validators: usize,
}

/// Where `prepare` puts the serializers it compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precompile {
    /// Into the serializer cache.
    Cached,
    /// Compiled and dropped; the cache is left untouched.
    Detached,
}

/// Everything the ready pass derives from one declaration.
struct PreparedRoute {
    responses: ResponseSchemaMap,
    validators: InputValidators,
    schemas: SchemaSet,
    version: SchemaSetVersion,
}

struct RouteEntry {
    scope: ScopeId,
    method: String,
    url: String,
    declaration: RouteDeclaration,
    prepared: Option<PreparedRoute>,
}

impl RouteEntry {
    fn label(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Schema-driven response serialization engine.
pub struct Engine {
    config: EngineConfig,
    scopes: ScopeTree,
    routes: Vec<RouteEntry>,
    cache: SerializerCache,
    default_compiler: SharedCompiler,
    ready: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineConfig::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("scopes", &self.scopes.len())
            .field("routes", &self.routes.len())
            .field("cache", &self.cache)
            .field("ready", &self.ready)
            .finish()
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let options = SerializerOptions {
            rounding: config.rounding,
        };
        Engine {
            config,
            scopes: ScopeTree::default(),
            routes: Vec::new(),
            cache: SerializerCache::new(config.cache_enabled),
            default_compiler: Arc::new(DefaultCompiler::new(options)),
            ready: false,
        }
    }

    /// Engine configured from `BRRTS_*` environment variables.
    pub fn from_env() -> Self {
        Engine::new(EngineConfig::from_env())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &SerializerCache {
        &self.cache
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn root(&self) -> ScopeId {
        ScopeId::ROOT
    }

    /// Open an encapsulated child scope; `prefix` is prepended to the URL of
    /// every route registered in it.
    pub fn child_scope(&mut self, parent: ScopeId, prefix: &str) -> Result<ScopeId, EngineError> {
        let id = self.scopes.child(parent, prefix)?;
        debug!(scope = %id, parent = %parent, prefix = %self.scopes.prefix(id)?, "Scope created");
        Ok(id)
    }

    /// Register a shared schema, visible to `scope` and its descendants.
    pub fn register_schema(&mut self, scope: ScopeId, document: Value) -> Result<(), EngineError> {
        let doc = self.scopes.register_schema(scope, document)?;
        debug!(scope = %scope, schema_id = %doc.label(), "Shared schema registered");
        if self.ready {
            self.refresh_schema_sets()?;
        }
        Ok(())
    }

    /// Bind a compile function to `scope` and its descendants.
    pub fn set_serializer_compiler(&mut self, scope: ScopeId, compiler: SharedCompiler) -> Result<(), EngineError> {
        debug!(scope = %scope, compiler = compiler.name(), "Serializer compiler bound");
        self.scopes.set_compiler(scope, compiler)?;
        if self.ready {
            self.cache.clear();
        }
        Ok(())
    }

    /// Bypass schema serialization for every route of `scope`.
    pub fn set_reply_serializer<F>(&mut self, scope: ScopeId, serializer: F) -> Result<(), EngineError>
    where
        F: Fn(&Value, u16) -> Payload + Send + Sync + 'static,
    {
        let serializer: ReplySerializer = Arc::new(serializer);
        self.scopes.set_reply_serializer(scope, serializer)
    }

    pub fn set_error_handler<H>(&mut self, scope: ScopeId, handler: H) -> Result<(), EngineError>
    where
        H: ErrorHandler + 'static,
    {
        self.scopes.set_error_handler(scope, Arc::new(handler))
    }

    /// Observe every error sent by routes of `scope` and its descendants.
    pub fn add_error_observer<F>(&mut self, scope: ScopeId, observer: F) -> Result<(), EngineError>
    where
        F: Fn(&HandlerError) + Send + Sync + 'static,
    {
        let observer: ErrorObserver = Arc::new(observer);
        self.scopes.add_observer(scope, observer)
    }

    /// Declare a route in `scope`. Routes cannot be added once ready.
    pub fn add_route(&mut self, scope: ScopeId, declaration: RouteDeclaration) -> Result<RouteId, EngineError> {
        let method = declaration.method.trim().to_ascii_uppercase();
        let url = join_prefix(self.scopes.prefix(scope)?, &declaration.url);
        if self.ready {
            return Err(EngineError::RouteAfterReady { method, url });
        }
        let id = RouteId(self.routes.len());
        debug!(route = %id, scope = %scope, method = %method, url = %url, "Route declared");
        self.routes.push(RouteEntry {
            scope,
            method,
            url,
            declaration,
            prepared: None,
        });
        Ok(id)
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .enumerate()
            .map(|(index, entry)| RouteInfo {
                id: RouteId(index),
                scope: entry.scope,
                method: entry.method.clone(),
                url: entry.url.clone(),
                prepared: entry.prepared.is_some(),
            })
            .collect()
    }

    /// Look a route up by method and full URL pattern.
    pub fn find_route(&self, method: &str, url: &str) -> Option<RouteId> {
        self.routes
            .iter()
            .position(|entry| entry.method.eq_ignore_ascii_case(method) && entry.url == url)
            .map(RouteId)
    }

    /// Validate and precompile every route.
    ///
    /// # Errors
    ///
    /// The first route that fails aborts the pass: unresolvable `$ref`s,
    /// content keys without a schema, invalid selectors, failing compile
    /// functions and invalid input schemas are all fatal.
    pub fn ready(&mut self) -> Result<ReadyReport, EngineError> {
        let started = Instant::now();
        let mut report = ReadyReport::default();
        for index in 0..self.routes.len() {
            let id = RouteId(index);
            let (prepared, serializers) = self.prepare(id, Precompile::Cached).map_err(|err| {
                error!(route = %id, code = %err.code(), error = %err, "Route preparation failed");
                err
            })?;
            report.routes += 1;
            report.serializers += serializers;
            report.validators += prepared.validators.len();
            if let Some(entry) = self.routes.get_mut(index) {
                entry.prepared = Some(prepared);
            }
        }
        self.ready = true;
        info!(
            routes = report.routes,
            serializers = report.serializers,
            validators = report.validators,
            cache_size = self.cache.size(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Precompiled serializers at startup"
        );
        Ok(report)
    }

    /// Run the ready checks on every route without marking anything ready,
    /// and report each failing route. Serializers are compiled but not cached.
    pub fn diagnose(&self) -> Vec<ValidationIssue> {
        (0..self.routes.len())
            .filter_map(|index| {
                let id = RouteId(index);
                let err = self.prepare(id, Precompile::Detached).err()?;
                let location = self
                    .routes
                    .get(index)
                    .map(RouteEntry::label)
                    .unwrap_or_else(|| id.to_string());
                Some(ValidationIssue::new(location, err.code().as_str(), err.to_string()))
            })
            .collect()
    }

    /// Serialize `value` as route `route` would for `status` and
    /// `content_type`. Without a matching schema the value goes out as
    /// plain JSON (strings verbatim).
    ///
    /// Before [`ready`](Engine::ready) the route is prepared again on every
    /// call, schema snapshot and fingerprint included.
    pub fn serialize(
        &self,
        route: RouteId,
        status: u16,
        content_type: Option<&str>,
        value: &Value,
    ) -> Result<Payload, EngineError> {
        let entry = self.entry(route)?;
        let built;
        let prepared = match &entry.prepared {
            Some(prepared) => prepared,
            None => {
                built = self.prepare(route, Precompile::Cached)?.0;
                &built
            }
        };
        let fallthrough = self.config.content_fallthrough;
        match prepared.responses.resolve(status, content_type, fallthrough) {
            Some(slot) => {
                let serializer = self.artifact(route, entry, prepared, &slot)?;
                Ok(serializer(value)?)
            }
            None => Ok(generic_payload(value.clone()).1),
        }
    }

    /// Run `reply` through the reply pipeline of `route`.
    ///
    /// Serialization failures never surface here: they become error
    /// responses. Only an unknown route, or a route that cannot be prepared
    /// before `ready`, is an `Err`. Like [`serialize`](Engine::serialize),
    /// a route that is not ready yet is prepared again on every call.
    pub fn send(&self, route: RouteId, reply: Reply) -> Result<SentResponse, EngineError> {
        let entry = self.entry(route)?;
        let built;
        let prepared = match &entry.prepared {
            Some(prepared) => prepared,
            None => {
                built = self.prepare(route, Precompile::Cached)?.0;
                &built
            }
        };
        let reply_serializer = self.scopes.reply_serializer(entry.scope)?;
        let handler = self.scopes.error_handler(entry.scope)?;
        let observers = self.scopes.observers(entry.scope)?;
        let default_handler = DefaultErrorHandler;
        let error_handler: &dyn ErrorHandler = match handler.as_deref() {
            Some(handler) => handler,
            None => &default_handler,
        };

        let fallthrough = self.config.content_fallthrough;
        let lookup: &SerializerLookup<'_> = &|status, content_type| {
            let Some(slot) = prepared.responses.resolve(status, content_type, fallthrough) else {
                return Ok(None);
            };
            self.artifact(route, entry, prepared, &slot)
                .map(Some)
                .map_err(|err| SerializeError::new(err.to_string()))
        };

        let pipeline = ReplyPipeline {
            method: &entry.method,
            url: &entry.url,
            reply_serializer: reply_serializer.as_ref(),
            error_handler,
            observers: &observers,
            lookup,
        };
        Ok(pipeline.send(reply))
    }

    /// Validate `input`, run `handler` when it passes, and send the result.
    /// A validation failure is sent as a `400` error reply instead.
    pub fn dispatch<H>(&self, route: RouteId, input: &RequestInput, handler: H) -> Result<SentResponse, EngineError>
    where
        H: FnOnce(&RequestInput) -> Reply,
    {
        let reply = match self.validate(route, input)? {
            Some(err) => Reply::error(err),
            None => handler(input),
        };
        self.send(route, reply)
    }

    /// Check `input` against the route's input schemas. `Ok(Some(_))` carries
    /// the `400` error the client would get.
    pub fn validate(&self, route: RouteId, input: &RequestInput) -> Result<Option<HandlerError>, EngineError> {
        let entry = self.entry(route)?;
        let built;
        let prepared = match &entry.prepared {
            Some(prepared) => prepared,
            None => {
                built = self.prepare(route, Precompile::Cached)?.0;
                &built
            }
        };
        Ok(prepared.validators.validate(input).err())
    }

    fn entry(&self, route: RouteId) -> Result<&RouteEntry, EngineError> {
        self.routes
            .get(route.index())
            .ok_or(EngineError::UnknownRoute(route))
    }

    /// Build the route's response map, check its references, compile every
    /// declared slot and the input validators. Returns the number of
    /// serializers compiled.
    fn prepare(&self, route: RouteId, precompile: Precompile) -> Result<(PreparedRoute, usize), EngineError> {
        let entry = self.entry(route)?;
        let responses = match &entry.declaration.response {
            Some(declaration) => ResponseSchemaMap::build(declaration, &entry.method, &entry.url)?,
            None => ResponseSchemaMap::default(),
        };
        let schemas = self.scopes.schema_set(entry.scope)?;
        let version = SchemaSetVersion::of(&schemas);
        let prepared = PreparedRoute {
            validators: InputValidators::compile(&entry.declaration.input, &schemas, &entry.method, &entry.url)?,
            responses,
            schemas,
            version,
        };

        let mut serializers = 0;
        for slot in prepared.responses.slots() {
            let document = Arc::new(SchemaDocument::inline(slot.schema.clone()));
            prepared
                .schemas
                .check_refs(&document)
                .map_err(|source| BuildError::Schema {
                    method: entry.method.clone(),
                    url: entry.url.clone(),
                    source,
                })?;
            match precompile {
                Precompile::Cached => {
                    self.artifact(route, entry, &prepared, &slot)?;
                }
                Precompile::Detached => {
                    self.compile_slot(entry, &prepared.schemas, &slot)?;
                }
            }
            serializers += 1;
        }
        Ok((prepared, serializers))
    }

    /// Cached serializer for one slot, compiled on first use.
    fn artifact(
        &self,
        route: RouteId,
        entry: &RouteEntry,
        prepared: &PreparedRoute,
        slot: &SchemaSlot<'_>,
    ) -> Result<SerializeFn, BuildError> {
        let key = ArtifactKey::new(route, slot.selector.to_string(), slot.content_type);
        self.cache.get_or_compile(&key, &prepared.version, || {
            self.compile_slot(entry, &prepared.schemas, slot)
        })
    }

    /// Route compiler first, then the nearest scope binding, then the
    /// built-in compiler.
    fn compiler_for(&self, entry: &RouteEntry) -> Result<SharedCompiler, BuildError> {
        if let Some(compiler) = &entry.declaration.serializer_compiler {
            return Ok(Arc::clone(compiler));
        }
        let bound = self
            .scopes
            .compiler(entry.scope)
            .map_err(|_| BuildError::UnknownScope {
                scope: entry.scope,
                method: entry.method.clone(),
                url: entry.url.clone(),
            })?;
        Ok(bound.unwrap_or_else(|| Arc::clone(&self.default_compiler)))
    }

    fn compile_slot(
        &self,
        entry: &RouteEntry,
        schemas: &SchemaSet,
        slot: &SchemaSlot<'_>,
    ) -> Result<SerializeFn, BuildError> {
        let compiler = self.compiler_for(entry)?;
        let http_status = slot.selector.to_string();
        let document = Arc::new(SchemaDocument::inline(slot.schema.clone()));
        let ctx = CompileContext {
            schema: slot.schema,
            method: &entry.method,
            url: &entry.url,
            http_status: &http_status,
            content_type: slot.content_type,
            schemas,
            document: &document,
        };
        compiler.compile(&ctx).map_err(|err| {
            error!(
                method = %entry.method,
                url = %entry.url,
                http_status = %http_status,
                content_type = ?slot.content_type,
                compiler = compiler.name(),
                error = %err,
                "Serializer compilation failed"
            );
            BuildError::SerializationBuild {
                method: entry.method.clone(),
                url: entry.url.clone(),
                http_status: http_status.clone(),
                content_type: slot.content_type.map(str::to_string),
                reason: err.to_string(),
            }
        })
    }

    /// Re-snapshot the schema set of every prepared route whose visible
    /// schemas changed. Their artifacts become stale and are rebuilt lazily.
    fn refresh_schema_sets(&mut self) -> Result<(), EngineError> {
        let mut refreshed = 0usize;
        for entry in self.routes.iter_mut() {
            let Some(prepared) = entry.prepared.as_mut() else {
                continue;
            };
            if self.scopes.generation(entry.scope)? == prepared.schemas.generation() {
                continue;
            }
            let schemas = self.scopes.schema_set(entry.scope)?;
            prepared.version = SchemaSetVersion::of(&schemas);
            prepared.schemas = schemas;
            refreshed += 1;
        }
        if refreshed > 0 {
            info!(routes = refreshed, "Schema sets refreshed after registration");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compiler, serializer};
    use crate::error::{BoxError, ErrorCode};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn person() -> Value {
        json!({
            "type": "object",
            "properties": { "name": { "type": "string" }, "work": { "type": "string" } }
        })
    }

    #[test]
    fn test_route_url_joins_scope_prefix() {
        let mut engine = Engine::default();
        let scope = engine.child_scope(engine.root(), "/foo").unwrap();
        let route = engine
            .add_route(scope, RouteDeclaration::new("get", "/:id"))
            .unwrap();
        let info = &engine.routes()[route.index()];
        assert_eq!(info.method, "GET");
        assert_eq!(info.url, "/foo/:id");
        assert_eq!(engine.find_route("GET", "/foo/:id"), Some(route));
        assert_eq!(engine.find_route("POST", "/foo/:id"), None);
    }

    #[test]
    fn test_route_after_ready_rejected() {
        let mut engine = Engine::default();
        engine.ready().unwrap();
        let err = engine
            .add_route(engine.root(), RouteDeclaration::new("GET", "/late"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RouteAfterReady);
    }

    #[test]
    fn test_ready_compiles_each_slot_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut engine = Engine::default();
        engine
            .set_serializer_compiler(
                engine.root(),
                compiler(move |_: &CompileContext<'_>| -> Result<SerializeFn, BoxError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(serializer(|v: &Value| Ok(Payload::Text(v.to_string()))))
                }),
            )
            .unwrap();
        let route = engine
            .add_route(
                engine.root(),
                RouteDeclaration::new("GET", "/").with_response(json!({
                    "200": person(),
                    "default": {
                        "content": {
                            "application/json": { "schema": person() },
                            "*/*": { "schema": { "type": "string" } }
                        }
                    }
                })),
            )
            .unwrap();
        let report = engine.ready().unwrap();
        assert_eq!(report.serializers, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        for _ in 0..5 {
            engine.serialize(route, 200, None, &json!({})).unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_serialize_without_schema_is_plain_json() {
        let mut engine = Engine::default();
        let route = engine
            .add_route(engine.root(), RouteDeclaration::new("GET", "/"))
            .unwrap();
        engine.ready().unwrap();
        let payload = engine
            .serialize(route, 200, None, &json!({ "a": 1 }))
            .unwrap();
        assert_eq!(payload.to_text(), r#"{"a":1}"#);
    }

    #[test]
    fn test_serialize_error_carries_code() {
        let mut engine = Engine::default();
        let route = engine
            .add_route(
                engine.root(),
                RouteDeclaration::new("GET", "/").with_response(json!({
                    "200": {
                        "type": "object",
                        "required": ["name"],
                        "properties": { "name": { "type": "string" } }
                    }
                })),
            )
            .unwrap();
        engine.ready().unwrap();
        let err = engine.serialize(route, 200, None, &json!({})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Serialization);
        assert_eq!(err.to_string(), "\"name\" is required!");
    }

    #[test]
    fn test_schema_after_ready_rebuilds_artifacts() {
        let mut engine = Engine::default();
        engine
            .register_schema(engine.root(), json!({ "$id": "first", "type": "string" }))
            .unwrap();
        let route = engine
            .add_route(
                engine.root(),
                RouteDeclaration::new("GET", "/").with_response(json!({ "200": person() })),
            )
            .unwrap();
        engine.ready().unwrap();
        let before = engine.serialize(route, 200, None, &json!({ "name": "a" })).unwrap();

        engine
            .register_schema(engine.root(), json!({ "$id": "second", "type": "string" }))
            .unwrap();
        let after = engine.serialize(route, 200, None, &json!({ "name": "a" })).unwrap();
        assert_eq!(before, after);
        assert_eq!(engine.cache().size(), 1);
    }

    #[test]
    fn test_diagnose_reports_each_failing_route() {
        let mut engine = Engine::default();
        engine
            .add_route(
                engine.root(),
                RouteDeclaration::new("GET", "/a").with_response(json!({ "200": { "$ref": "missing#" } })),
            )
            .unwrap();
        engine
            .add_route(
                engine.root(),
                RouteDeclaration::new("GET", "/b").with_response(json!({
                    "200": { "content": { "type": {} } }
                })),
            )
            .unwrap();
        engine
            .add_route(engine.root(), RouteDeclaration::new("GET", "/ok"))
            .unwrap();
        let issues = engine.diagnose();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].location, "GET /a");
        assert_eq!(issues[0].kind, "ERR_SCH_REF_NOT_FOUND");
        assert_eq!(issues[1].kind, "ERR_SCH_CONTENT_MISSING_SCHEMA");
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_diagnose_leaves_cache_empty() {
        let mut engine = Engine::default();
        engine
            .add_route(
                engine.root(),
                RouteDeclaration::new("GET", "/ok").with_response(json!({ "200": person() })),
            )
            .unwrap();
        assert!(engine.diagnose().is_empty());
        assert_eq!(engine.cache().size(), 0);

        engine.ready().unwrap();
        assert_eq!(engine.cache().size(), 1);
    }

    #[test]
    fn test_compiler_lookup_reports_unknown_scope() {
        let mut engine = Engine::default();
        engine
            .add_route(
                engine.root(),
                RouteDeclaration::new("GET", "/").with_response(json!({ "200": person() })),
            )
            .unwrap();
        engine.routes[0].scope = ScopeId(42);

        let err = engine.compiler_for(&engine.routes[0]).err().unwrap();
        assert_eq!(err.code(), ErrorCode::UnknownScope);
        assert_eq!(err.to_string(), "Unknown scope scope#42 (GET /)");
    }

    #[test]
    fn test_unknown_route() {
        let engine = Engine::default();
        let err = engine.send(RouteId(3), Reply::new(json!({}))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownRoute);
    }
}

//! Route manifests.
//!
//! A manifest declares shared schemas, routes and nested scopes in one YAML
//! or JSON file, so an engine can be set up (and checked) without code:
//!
//! ```yaml
//! name: people
//! schemas:
//!   - $id: "http://example.com/person"
//!     type: object
//!     properties:
//!       name: { type: string }
//! routes:
//!   - method: GET
//!     url: /
//!     response:
//!       "2xx": { $ref: "http://example.com/person#" }
//! scopes:
//!   - prefix: /admin
//!     routes:
//!       - method: GET
//!         url: /:id
//!         params:
//!           type: object
//!           properties: { id: { type: integer } }
//! ```
//!
//! Files ending in `.yaml`/`.yml` are read as YAML, anything else as JSON.
//! Status keys are best quoted in YAML so they stay strings.

use crate::engine::{Engine, RouteDeclaration};
use crate::error::EngineError;
use crate::ids::ScopeId;
use crate::runtime_config::EngineConfig;
use crate::validator::InputSchemas;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// One route entry of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteManifest {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(flatten)]
    pub input: InputSchemas,
}

impl RouteManifest {
    pub fn declaration(&self) -> RouteDeclaration {
        RouteDeclaration {
            response: self.response.clone(),
            input: self.input.clone(),
            ..RouteDeclaration::new(self.method.clone(), self.url.clone())
        }
    }
}

/// A scope with its schemas, routes and children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeManifest {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub schemas: Vec<Value>,
    #[serde(default)]
    pub routes: Vec<RouteManifest>,
    #[serde(default)]
    pub scopes: Vec<ScopeManifest>,
}

impl ScopeManifest {
    fn route_count(&self) -> usize {
        self.routes.len() + self.scopes.iter().map(ScopeManifest::route_count).sum::<usize>()
    }

    /// Schemas first, then routes, then children, so a child can see every
    /// schema of its parent.
    fn apply(&self, engine: &mut Engine, scope: ScopeId) -> Result<(), EngineError> {
        for schema in &self.schemas {
            engine.register_schema(scope, schema.clone())?;
        }
        for route in &self.routes {
            engine.add_route(scope, route.declaration())?;
        }
        for child in &self.scopes {
            let id = engine.child_scope(scope, &child.prefix)?;
            child.apply(engine, id)?;
        }
        Ok(())
    }
}

/// A whole manifest file. The top level is the root scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub root: ScopeManifest,
}

impl Manifest {
    /// Read a manifest, picking the format from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let manifest = if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        };
        manifest.with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML manifest")
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("Failed to parse JSON manifest")
    }

    pub fn route_count(&self) -> usize {
        self.root.route_count()
    }

    /// Register everything into the root scope of `engine`.
    pub fn apply(&self, engine: &mut Engine) -> Result<(), EngineError> {
        let root = engine.root();
        self.root.apply(engine, root)?;
        info!(
            manifest = self.name.as_deref().unwrap_or("unnamed"),
            routes = self.route_count(),
            "Manifest applied"
        );
        Ok(())
    }

    /// Build an engine from this manifest (not yet ready).
    pub fn into_engine(&self, config: EngineConfig) -> anyhow::Result<Engine> {
        let mut engine = Engine::new(config);
        self.apply(&mut engine)
            .context("Failed to register manifest declarations")?;
        Ok(engine)
    }
}

//! Scope tree.
//!
//! Scopes mirror encapsulated plugins: each one may bind a serializer
//! compiler, a reply serializer override and an error handler, all inherited
//! by descendants until shadowed. Error observers accumulate instead of
//! shadowing. Shared schemas registered on a scope are visible to it and to
//! its descendants.

use crate::compiler::SharedCompiler;
use crate::error::{EngineError, SchemaError};
use crate::ids::ScopeId;
use crate::reply::{ErrorHandler, ErrorObserver, ReplySerializer};
use crate::schema::{SchemaDocument, SchemaSet, SchemaStore};
use serde_json::Value;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct ScopeNode {
    parent: Option<ScopeId>,
    /// Full URL prefix, including every ancestor's.
    prefix: String,
    compiler: Option<SharedCompiler>,
    reply_serializer: Option<ReplySerializer>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    observers: Vec<ErrorObserver>,
    schemas: SchemaStore,
    /// Bumped on every schema registered directly on this scope.
    generation: u64,
}

pub(crate) struct ScopeTree {
    nodes: Vec<ScopeNode>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self {
            nodes: vec![ScopeNode::default()],
        }
    }
}

impl ScopeTree {
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: ScopeId) -> Result<&ScopeNode, EngineError> {
        self.nodes.get(id.index()).ok_or(EngineError::UnknownScope(id))
    }

    fn node_mut(&mut self, id: ScopeId) -> Result<&mut ScopeNode, EngineError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(EngineError::UnknownScope(id))
    }

    pub(crate) fn child(&mut self, parent: ScopeId, prefix: &str) -> Result<ScopeId, EngineError> {
        let parent_prefix = self.node(parent)?.prefix.clone();
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode {
            parent: Some(parent),
            prefix: join_prefix(&parent_prefix, prefix),
            ..ScopeNode::default()
        });
        Ok(id)
    }

    /// `id` and its ancestors, innermost first.
    pub(crate) fn chain(&self, id: ScopeId) -> Result<Vec<ScopeId>, EngineError> {
        let mut chain = vec![id];
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            chain.push(parent);
            current = self.node(parent)?;
        }
        Ok(chain)
    }

    fn nodes_in(&self, id: ScopeId) -> Result<impl Iterator<Item = &ScopeNode>, EngineError> {
        let chain = self.chain(id)?;
        Ok(chain.into_iter().filter_map(|s| self.nodes.get(s.index())))
    }

    pub(crate) fn prefix(&self, id: ScopeId) -> Result<&str, EngineError> {
        Ok(&self.node(id)?.prefix)
    }

    pub(crate) fn set_compiler(&mut self, id: ScopeId, compiler: SharedCompiler) -> Result<(), EngineError> {
        self.node_mut(id)?.compiler = Some(compiler);
        Ok(())
    }

    pub(crate) fn set_reply_serializer(&mut self, id: ScopeId, serializer: ReplySerializer) -> Result<(), EngineError> {
        self.node_mut(id)?.reply_serializer = Some(serializer);
        Ok(())
    }

    pub(crate) fn set_error_handler(&mut self, id: ScopeId, handler: Arc<dyn ErrorHandler>) -> Result<(), EngineError> {
        self.node_mut(id)?.error_handler = Some(handler);
        Ok(())
    }

    pub(crate) fn add_observer(&mut self, id: ScopeId, observer: ErrorObserver) -> Result<(), EngineError> {
        self.node_mut(id)?.observers.push(observer);
        Ok(())
    }

    /// Nearest compiler bound on the chain.
    pub(crate) fn compiler(&self, id: ScopeId) -> Result<Option<SharedCompiler>, EngineError> {
        Ok(self.nodes_in(id)?.find_map(|n| n.compiler.clone()))
    }

    pub(crate) fn reply_serializer(&self, id: ScopeId) -> Result<Option<ReplySerializer>, EngineError> {
        Ok(self.nodes_in(id)?.find_map(|n| n.reply_serializer.clone()))
    }

    pub(crate) fn error_handler(&self, id: ScopeId) -> Result<Option<Arc<dyn ErrorHandler>>, EngineError> {
        Ok(self.nodes_in(id)?.find_map(|n| n.error_handler.clone()))
    }

    /// Observers of the whole chain, outermost first.
    pub(crate) fn observers(&self, id: ScopeId) -> Result<Vec<ErrorObserver>, EngineError> {
        let mut nodes: Vec<&ScopeNode> = self.nodes_in(id)?.collect();
        nodes.reverse();
        Ok(nodes
            .into_iter()
            .flat_map(|n| n.observers.iter().cloned())
            .collect())
    }

    /// Register a shared schema on `id`; ids already visible from `id` are
    /// rejected.
    pub(crate) fn register_schema(&mut self, id: ScopeId, document: Value) -> Result<Arc<SchemaDocument>, EngineError> {
        let visible = self.schema_set(id)?;
        let candidate = SchemaDocument::new(document.clone())?;
        if let Some(existing) = candidate.id().filter(|doc_id| visible.contains(doc_id)) {
            return Err(SchemaError::AlreadyPresent {
                id: existing.to_string(),
            }
            .into());
        }
        let node = self.node_mut(id)?;
        let doc = node.schemas.register(document)?;
        node.generation += 1;
        Ok(doc)
    }

    /// Sum of generations along the chain; grows whenever any visible
    /// schema set changes.
    pub(crate) fn generation(&self, id: ScopeId) -> Result<u64, EngineError> {
        Ok(self.nodes_in(id)?.map(|n| n.generation).sum())
    }

    /// Schemas visible from `id`.
    pub(crate) fn schema_set(&self, id: ScopeId) -> Result<SchemaSet, EngineError> {
        let mut nodes: Vec<&ScopeNode> = self.nodes_in(id)?.collect();
        let generation = nodes.iter().map(|n| n.generation).sum();
        nodes.reverse();
        Ok(SchemaSet::from_stores(
            nodes.into_iter().map(|n| &n.schemas),
            generation,
        ))
    }
}

/// Join a scope prefix and a route path the way encapsulated plugins do:
/// `/foo` + `/:id` is `/foo/:id`, `/foo` + `/` is `/foo`.
pub(crate) fn join_prefix(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim();
    if prefix.is_empty() {
        return if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
    }
    match path {
        "" | "/" => prefix.to_string(),
        p if p.starts_with('/') => format!("{prefix}{p}"),
        p => format!("{prefix}/{p}"),
    }
}

//! # Compiled Serializer Cache
//!
//! Compile functions can be expensive (the default compiler walks and resolves
//! the whole schema graph). This cache stores one compiled serializer per
//! (route, status selector, content type) and shares it across requests.
//!
//! ## Features
//!
//! - **Generation tagging**: every artifact records the [`SchemaSetVersion`]
//!   it was built against; an artifact built against an older schema set is
//!   rebuilt transparently on its next use
//! - **Thread-safe**: `Arc<RwLock<HashMap>>`; lookups only take the read lock
//! - **No partial entries**: compilation happens outside the lock and the
//!   finished artifact is inserted in one step
//! - **Configurable**: can be disabled with `BRRTS_SERIALIZER_CACHE=off`, in
//!   which case every lookup compiles
//!
//! ## Usage
//!
//! ```rust
//! use brrtserializer::compiler::{serializer, Payload};
//! use brrtserializer::ids::RouteId;
//! use brrtserializer::serializer_cache::{ArtifactKey, SchemaSetVersion, SerializerCache};
//!
//! let cache = SerializerCache::new(true);
//! let key = ArtifactKey::new(RouteId::from(0), "200", Some("application/json"));
//! let version = SchemaSetVersion::new(1, "abc123");
//! let f = cache
//!     .get_or_compile(&key, &version, || Ok(serializer(|v| Ok(Payload::Text(v.to_string())))))
//!     .unwrap();
//! assert_eq!(cache.size(), 1);
//! # let _ = f;
//! ```

use crate::compiler::SerializeFn;
use crate::error::BuildError;
use crate::ids::RouteId;
use crate::schema::SchemaSet;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Version of the schema set an artifact was compiled against.
///
/// Combines the scope chain's generation counter with a content fingerprint
/// of the visible schemas.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaSetVersion {
    /// Sum of scope generations along the route's scope chain
    pub generation: u64,
    /// First 16 hex chars of the SHA-256 over the visible schemas
    pub hash: String,
}

impl SchemaSetVersion {
    pub fn new(generation: u64, hash: impl Into<String>) -> Self {
        Self {
            generation,
            hash: hash.into(),
        }
    }

    /// Version of a merged schema set.
    pub fn of(set: &SchemaSet) -> Self {
        Self {
            generation: set.generation(),
            hash: set.fingerprint(),
        }
    }

    /// Format as a log/key component: `{generation}:{hash}`.
    pub fn to_key(&self) -> String {
        format!("{}:{}", self.generation, self.hash)
    }
}

impl Default for SchemaSetVersion {
    fn default() -> Self {
        Self {
            generation: 0,
            hash: "initial".to_string(),
        }
    }
}

/// Identity of one compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub route: RouteId,
    /// `200`, `2xx` or `default`
    pub http_status: String,
    /// Declared content type key, `None` for a plain schema
    pub content_type: Option<String>,
}

impl ArtifactKey {
    pub fn new(route: RouteId, http_status: impl Into<String>, content_type: Option<&str>) -> Self {
        Self {
            route,
            http_status: http_status.into(),
            content_type: content_type.map(str::to_string),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.route,
            self.http_status,
            self.content_type.as_deref().unwrap_or("-")
        )
    }
}

struct CachedSerializer {
    version: SchemaSetVersion,
    serializer: SerializeFn,
}

/// Thread-safe cache of compiled serializers.
///
/// # Example
///
/// ```rust
/// use brrtserializer::serializer_cache::SerializerCache;
///
/// let cache = SerializerCache::new(false);
/// assert!(!cache.is_enabled());
/// assert_eq!(cache.size(), 0);
/// ```
#[derive(Clone)]
pub struct SerializerCache {
    cache: Arc<RwLock<HashMap<ArtifactKey, CachedSerializer>>>,
    enabled: bool,
}

impl SerializerCache {
    /// Create a new serializer cache
    ///
    /// # Arguments
    ///
    /// * `enabled` - Whether artifacts are kept between lookups (from `EngineConfig`)
    pub fn new(enabled: bool) -> Self {
        info!(enabled = enabled, "Initializing compiled serializer cache");
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the artifact for `key` if one exists for exactly `version`.
    pub fn get(&self, key: &ArtifactKey, version: &SchemaSetVersion) -> Option<SerializeFn> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(key)
            .filter(|entry| &entry.version == version)
            .map(|entry| Arc::clone(&entry.serializer))
    }

    /// Get a cached serializer or compile and cache a new one
    ///
    /// # Arguments
    ///
    /// * `key` - Route, status selector and content type of the artifact
    /// * `version` - Schema set version the caller is serving with
    /// * `compile` - Invoked on a miss, or when the cached artifact is stale
    ///
    /// # Returns
    ///
    /// The serializer, or the compile function's error. A failed compilation
    /// leaves the cache untouched.
    ///
    /// # Performance
    ///
    /// - Cache hit: read lock + HashMap lookup
    /// - Cache miss: compilation without any lock held, then a short write lock
    pub fn get_or_compile<F>(
        &self,
        key: &ArtifactKey,
        version: &SchemaSetVersion,
        compile: F,
    ) -> Result<SerializeFn, BuildError>
    where
        F: FnOnce() -> Result<SerializeFn, BuildError>,
    {
        if !self.enabled {
            return compile();
        }

        let stale = {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            match cache.get(key) {
                Some(entry) if &entry.version == version => {
                    debug!(
                        artifact = %key,
                        schema_version = %version.to_key(),
                        "Serializer cache hit"
                    );
                    return Ok(Arc::clone(&entry.serializer));
                }
                Some(entry) => Some(entry.version.clone()),
                None => None,
            }
        };

        let serializer = compile()?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);

        // Double-check: another thread may have compiled the same version while we did
        if let Some(existing) = cache.get(key).filter(|entry| &entry.version == version) {
            debug!(artifact = %key, "Serializer compiled by another thread");
            return Ok(Arc::clone(&existing.serializer));
        }

        cache.insert(
            key.clone(),
            CachedSerializer {
                version: version.clone(),
                serializer: Arc::clone(&serializer),
            },
        );
        match stale {
            Some(old) => info!(
                artifact = %key,
                old_version = %old.to_key(),
                new_version = %version.to_key(),
                "Rebuilt stale serializer after schema set change"
            ),
            None => debug!(
                artifact = %key,
                schema_version = %version.to_key(),
                cache_size = cache.len(),
                "Serializer compiled and cached"
            ),
        }
        Ok(serializer)
    }

    /// Number of cached artifacts.
    pub fn size(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every artifact; the next lookups recompile.
    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = cache.len();
        cache.clear();
        info!(dropped = dropped, "Serializer cache cleared");
    }
}

impl fmt::Debug for SerializerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerCache")
            .field("enabled", &self.enabled)
            .field("size", &self.size())
            .finish()
    }
}

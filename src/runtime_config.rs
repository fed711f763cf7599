//! # Runtime Configuration Module
//!
//! Environment-driven settings of the [`Engine`](crate::engine::Engine).
//!
//! ## Environment Variables
//!
//! ### `BRRTS_SERIALIZER_CACHE`
//!
//! `on` (default) or `off`. With the cache off every lookup compiles a fresh
//! serializer, which is slow but handy when debugging a compile function.
//!
//! ### `BRRTS_INTEGER_ROUNDING`
//!
//! How the built-in compiler turns fractional numbers into integers:
//! `trunc` (default), `ceil`, `floor` or `round`.
//!
//! ### `BRRTS_CONTENT_FALLTHROUGH`
//!
//! `stop` (default) or `next`. Decides what happens when a declared status
//! selector has a content map without an entry for the outgoing content type
//! and without a `*/*` entry. `stop` sends the payload raw; `next` keeps
//! looking at the less specific selectors.
//!
//! ## Usage
//!
//! ```rust
//! use brrtserializer::runtime_config::EngineConfig;
//!
//! let config = EngineConfig::from_env();
//! println!("Serializer cache enabled: {}", config.cache_enabled);
//! ```
//!
//! Invalid values are logged and replaced by the default.

use crate::compiler::Rounding;
use crate::response::ContentFallthrough;
use std::env;
use std::str::FromStr;
use tracing::warn;

pub const ENV_SERIALIZER_CACHE: &str = "BRRTS_SERIALIZER_CACHE";
pub const ENV_INTEGER_ROUNDING: &str = "BRRTS_INTEGER_ROUNDING";
pub const ENV_CONTENT_FALLTHROUGH: &str = "BRRTS_CONTENT_FALLTHROUGH";

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Keep compiled serializers between lookups (default: true)
    pub cache_enabled: bool,
    /// Integer coercion used by the built-in compiler (default: trunc)
    pub rounding: Rounding,
    /// Content map miss policy (default: stop)
    pub content_fallthrough: ContentFallthrough,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_enabled: true,
            rounding: Rounding::Trunc,
            content_fallthrough: ContentFallthrough::Stop,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();
        let cache_enabled = match lookup(ENV_SERIALIZER_CACHE) {
            Some(val) => parse_switch(&val).unwrap_or_else(|| {
                warn!(variable = ENV_SERIALIZER_CACHE, value = %val, "Invalid switch, using default");
                defaults.cache_enabled
            }),
            None => defaults.cache_enabled,
        };
        EngineConfig {
            cache_enabled,
            rounding: parse_or(&lookup, ENV_INTEGER_ROUNDING, defaults.rounding),
            content_fallthrough: parse_or(&lookup, ENV_CONTENT_FALLTHROUGH, defaults.content_fallthrough),
        }
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn with_content_fallthrough(mut self, fallthrough: ContentFallthrough) -> Self {
        self.content_fallthrough = fallthrough;
        self
    }
}

fn parse_switch(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr<Err = String>,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => val.parse().unwrap_or_else(|err: String| {
            warn!(variable = key, error = %err, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

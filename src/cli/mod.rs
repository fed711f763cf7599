//! # CLI Module
//!
//! Command-line access to the engine, driven by a route manifest
//! (see [`crate::manifest`]).
//!
//! ## Commands
//!
//! ### `check`
//!
//! Run the ready pass and report every route that would abort startup:
//!
//! ```bash
//! brrts check --manifest routes.yaml
//! ```
//!
//! ### `routes`
//!
//! List the declared routes with scope prefixes applied:
//!
//! ```bash
//! brrts routes --manifest routes.yaml
//! ```
//!
//! ### `render`
//!
//! Print the status, content type and body a route would send for a value:
//!
//! ```bash
//! brrts render --manifest routes.yaml --url / --status 201 \
//!     --content-type application/vnd.v1+json --value '{"name":"Foo"}'
//! ```
//!
//! Global flags `--rounding` and `--content-fallthrough` override the
//! `BRRTS_*` environment settings.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run_cli, Cli, Commands};

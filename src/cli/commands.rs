use crate::compiler::Rounding;
use crate::engine::Engine;
use crate::manifest::Manifest;
use crate::reply::Reply;
use crate::response::ContentFallthrough;
use crate::runtime_config::EngineConfig;
use crate::validator::print_issues;
use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Command-line interface for brrtserializer
///
/// Checks route manifests and renders responses the way a server using the
/// engine would send them.
#[derive(Debug, Parser)]
#[command(name = "brrts")]
#[command(about = "Schema-driven response serialization", long_about = None)]
pub struct Cli {
    /// Log level for diagnostics written to stderr
    #[arg(long, global = true, env = "BRRTS_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Integer rounding of the built-in compiler (trunc|ceil|floor|round)
    #[arg(long, global = true)]
    pub rounding: Option<Rounding>,

    /// Content map miss policy (stop|next)
    #[arg(long, global = true)]
    pub content_fallthrough: Option<ContentFallthrough>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the ready pass over a manifest and report every failing route
    Check {
        /// Path to the manifest (YAML or JSON)
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// List the routes of a manifest with their full URL patterns
    Routes {
        /// Path to the manifest (YAML or JSON)
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Serialize a value as a route would send it
    Render {
        /// Path to the manifest (YAML or JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// HTTP method of the route
        #[arg(long, default_value = "GET")]
        method: String,

        /// Full URL pattern of the route, scope prefixes included
        #[arg(short, long)]
        url: String,

        /// Status code of the reply
        #[arg(short, long, default_value_t = 200)]
        status: u16,

        /// Declared outgoing content type
        #[arg(long)]
        content_type: Option<String>,

        /// The reply value as JSON
        #[arg(long)]
        value: String,
    },
}

impl Cli {
    /// Engine settings: environment first, flags on top.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(rounding) = self.rounding {
            config = config.with_rounding(rounding);
        }
        if let Some(fallthrough) = self.content_fallthrough {
            config = config.with_content_fallthrough(fallthrough);
        }
        config
    }
}

fn load_engine(path: &Path, config: EngineConfig) -> anyhow::Result<Engine> {
    Manifest::from_path(path)?.into_engine(config)
}

/// Execute `cli`, writing command output to `out`.
pub fn run_cli(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    let config = cli.engine_config();
    match &cli.command {
        Commands::Check { manifest } => {
            let mut engine = load_engine(manifest, config)?;
            let issues = engine.diagnose();
            if !issues.is_empty() {
                print_issues(&issues);
                bail!("{} route(s) failed the ready pass", issues.len());
            }
            let report = engine.ready()?;
            writeln!(
                out,
                "✅ {}: {} route(s), {} serializer(s), {} validator(s)",
                manifest.display(),
                report.routes,
                report.serializers,
                report.validators
            )?;
            Ok(())
        }
        Commands::Routes { manifest } => {
            let engine = load_engine(manifest, config)?;
            for route in engine.routes() {
                writeln!(out, "{:<7} {}", route.method, route.url)?;
            }
            Ok(())
        }
        Commands::Render {
            manifest,
            method,
            url,
            status,
            content_type,
            value,
        } => {
            let value: Value = serde_json::from_str(value).context("--value must be valid JSON")?;
            let mut engine = load_engine(manifest, config)?;
            engine.ready()?;
            let route = engine
                .find_route(method, url)
                .ok_or_else(|| anyhow!("No route {} {url} in {}", method.to_uppercase(), manifest.display()))?;

            let mut reply = Reply::new(value).code(*status);
            if let Some(content_type) = content_type {
                reply = reply.content_type(content_type.clone());
            }
            let sent = engine.send(route, reply)?;
            writeln!(out, "{} {}", sent.status, sent.content_type)?;
            writeln!(out, "{}", sent.text())?;
            Ok(())
        }
    }
}

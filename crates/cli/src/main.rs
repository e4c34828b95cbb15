//! q3query - Query Quake 3 principal and game servers
//!
//! # Commands
//!
//! - `q3query servers` - List the servers registered with a principal
//! - `q3query status` - Show the variables and players of one game server
//!
//! # Usage
//!
//! ```bash
//! # Servers known to a built-in principal
//! q3query servers quake3
//!
//! # Any principal, with the status of every listed server
//! q3query servers master.ioquake3.org:27950 --protocol 68 --status
//!
//! # A Medal of Honor server, colour codes kept
//! q3query status 185.107.96.110:12203 --mohaa --colors
//! ```
//!
//! Results are written to stdout as JSON, logs go to stderr.

mod servers;
mod status;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use q3query_config::QueryConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// q3query - Quake 3 server query tool
#[derive(Parser)]
#[command(name = "q3query")]
#[command(about = "Query Quake 3 principal and game servers")]
#[command(version)]
struct Cli {
    /// Options file (defaults to q3query.txt when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List servers registered with a principal
    Servers(servers::ServersArgs),

    /// Query a single game server
    Status(status::StatusArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    if cli.verbose {
        config.display();
    }

    match cli.command {
        Commands::Servers(args) => servers::execute(args, &config),
        Commands::Status(args) => status::execute(args, &config),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<QueryConfig> {
    match path {
        Some(path) => QueryConfig::load_from_file(path)
            .with_context(|| format!("Failed to load options file: {}", path.display())),
        None => Ok(QueryConfig::load_default().unwrap_or_else(|e| {
            warn!("Failed to load {}: {}", q3query_config::DEFAULT_CONFIG_PATH, e);
            QueryConfig::default()
        })),
    }
}

/// Split `host:port`
pub(crate) fn parse_target(target: &str) -> Result<(String, u16)> {
    let Some((host, port)) = target.rsplit_once(':') else {
        bail!("expected host:port, got '{}'", target);
    };
    if host.is_empty() {
        bail!("missing host in '{}'", target);
    }
    let port = port
        .parse()
        .with_context(|| format!("invalid port in '{}'", target))?;
    Ok((host.to_string(), port))
}

/// clap value parser for timeouts given in seconds
pub(crate) fn parse_timeout(value: &str) -> std::result::Result<Duration, String> {
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        _ => Err(format!("'{}' is not a positive number of seconds", value)),
    }
}

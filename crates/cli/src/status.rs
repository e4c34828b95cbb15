//! Status command - show the variables and players of one game server

use anyhow::{Context, Result};
use clap::Args;
use q3query_config::QueryConfig;
use q3query_network::GameServer;
use std::time::Duration;

use crate::{parse_target, parse_timeout};

/// Arguments for the status command
#[derive(Args)]
pub struct StatusArgs {
    /// Game server address as host:port
    pub target: String,

    /// Use the Medal of Honor status protocol
    #[arg(long)]
    pub mohaa: bool,

    /// Keep colour codes in names and values
    #[arg(long)]
    pub colors: bool,

    /// Timeout in seconds
    #[arg(short, long, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,
}

/// Execute the status command
pub fn execute(args: StatusArgs, config: &QueryConfig) -> Result<()> {
    let (host, port) = parse_target(&args.target)?;
    let server = if args.mohaa {
        GameServer::medal_of_honor(host, port)
    } else {
        GameServer::new(host, port)
    };

    let strip_colors = config.strip_colors && !args.colors;
    let timeout = args.timeout.unwrap_or(config.status_timeout);
    let status = server
        .get_status(strip_colors, Some(timeout))
        .with_context(|| format!("Failed to query {}", args.target))?;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

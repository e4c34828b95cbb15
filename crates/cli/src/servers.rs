//! Servers command - list the servers registered with a principal

use anyhow::{Context, Result};
use clap::Args;
use q3query_config::{parse_hex, PrincipalPreset, QueryConfig};
use q3query_core::TransportKind;
use q3query_network::{GameServer, ReaderKind};
use std::time::Duration;
use tracing::{info, warn};

use crate::{parse_target, parse_timeout};

/// Arguments for the servers command
#[derive(Args)]
pub struct ServersArgs {
    /// Preset name (quake3, nexuiz, tremulous, cod4, cod4x) or host:port
    pub target: String,

    /// Protocol version the listed servers must speak
    #[arg(short, long)]
    pub protocol: Option<u32>,

    /// Game name, for principals shared by several games
    #[arg(short, long)]
    pub game: Option<String>,

    /// Filter keywords
    #[arg(short, long)]
    pub keywords: Option<String>,

    /// Query over TCP
    #[arg(long)]
    pub tcp: bool,

    /// End-of-response policy: eof or timeout
    #[arg(long, value_parser = parse_reader)]
    pub reader: Option<ReaderKind>,

    /// Hex bytes in front of every entry address, e.g. "00 00 00 00 04"
    #[arg(long)]
    pub prefix: Option<String>,

    /// Timeout in seconds
    #[arg(short, long, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Also query the status of every listed server
    #[arg(short, long)]
    pub status: bool,
}

fn parse_reader(value: &str) -> std::result::Result<ReaderKind, String> {
    ReaderKind::from_name(value).ok_or_else(|| format!("unknown reader '{}', expected eof or timeout", value))
}

/// Preset named by the target, or an ad hoc one for `host:port`
fn resolve_preset(args: &ServersArgs, config: &QueryConfig) -> Result<PrincipalPreset> {
    let mut preset = match config.preset(&args.target) {
        Some(preset) => preset.clone(),
        None => {
            let (host, port) = parse_target(&args.target)
                .with_context(|| format!("'{}' is neither a preset nor host:port", args.target))?;
            PrincipalPreset::new(args.target.as_str(), host, port, 68)
        }
    };

    if let Some(protocol) = args.protocol {
        preset.protocol = protocol;
    }
    if let Some(game) = &args.game {
        preset.game = Some(game.clone());
    }
    if let Some(keywords) = &args.keywords {
        preset.keywords = Some(keywords.clone());
    }
    if args.tcp {
        preset.transport = TransportKind::Stream;
    }
    if let Some(reader) = args.reader {
        preset.reader = reader;
    }
    if let Some(prefix) = &args.prefix {
        preset.entry_prefix = parse_hex(prefix).with_context(|| format!("Invalid prefix: {}", prefix))?;
    }
    if let Some(timeout) = args.timeout {
        preset.timeout = Some(timeout);
    }

    Ok(preset)
}

/// Execute the servers command
pub fn execute(args: ServersArgs, config: &QueryConfig) -> Result<()> {
    let preset = resolve_preset(&args, config)?;
    let principal = preset.principal();

    let servers = principal
        .get_servers(
            preset.protocol,
            preset.game.as_deref(),
            config.keywords_for(&preset),
            Some(config.timeout_for(&preset)),
        )
        .with_context(|| format!("Failed to query {}:{}", preset.address, preset.port))?;

    if !args.status {
        println!("{}", serde_json::to_string_pretty(&servers)?);
        return Ok(());
    }

    let mut statuses = Vec::new();
    for endpoint in servers {
        let server = GameServer::from(endpoint);
        match server.get_status(config.strip_colors, Some(config.status_timeout)) {
            Ok(status) => statuses.push(status),
            Err(e) => warn!("{}: {}", server.endpoint(), e),
        }
    }
    info!("{} servers answered", statuses.len());

    println!("{}", serde_json::to_string_pretty(&statuses)?);
    Ok(())
}

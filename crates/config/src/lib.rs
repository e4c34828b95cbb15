//! q3query Configuration Management
//!
//! Loads query defaults and principal server presets from `q3query.txt`.
//!
//! # Format
//!
//! ```text
//! # comment
//! timeout = 1.5
//! stripcolors = true
//! principal.ioq3.address = master.ioquake3.org
//! principal.ioq3.port = 27950
//! principal.ioq3.protocol = 68
//! ```

use q3query_core::{QueryError, Result, TransportKind};
use q3query_network::{GameServer, PrincipalServer, ReaderKind};
use q3query_protocol::DEFAULT_KEYWORDS;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Options file looked up by [`QueryConfig::load_default`]
pub const DEFAULT_CONFIG_PATH: &str = "q3query.txt";

/// Query settings
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Principal query timeout (from "timeout" option, seconds)
    pub timeout: Duration,
    /// Game server query timeout (from "statustimeout" option, seconds)
    pub status_timeout: Duration,
    /// Strip colour codes (from "stripcolors" option)
    pub strip_colors: bool,
    /// Keywords for principals without their own (from "keywords" option)
    pub keywords: String,
    /// Built-in presets followed by the ones from the options file
    pub principals: Vec<PrincipalPreset>,
}

/// Connection settings for one principal server
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalPreset {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub protocol: u32,
    pub game: Option<String>,
    pub transport: TransportKind,
    pub reader: ReaderKind,
    pub entry_prefix: Vec<u8>,
    pub keywords: Option<String>,
    pub timeout: Option<Duration>,
}

impl PrincipalPreset {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16, protocol: u32) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            protocol,
            game: None,
            transport: TransportKind::Datagram,
            reader: ReaderKind::Eof,
            entry_prefix: Vec::new(),
            keywords: None,
            timeout: None,
        }
    }

    /// Client configured for this principal
    pub fn principal(&self) -> PrincipalServer {
        PrincipalServer::new(self.address.as_str(), self.port)
            .transport(self.transport)
            .entry_prefix(self.entry_prefix.clone())
            .reader(self.reader.build())
    }

    fn set(&mut self, field: &str, value: &str) {
        match field {
            "address" => self.address = value.into(),
            "port" => {
                self.port = value.parse().unwrap_or(self.port);
            }
            "protocol" => {
                self.protocol = value.parse().unwrap_or(self.protocol);
            }
            "game" => {
                self.game = (!value.is_empty()).then(|| value.to_string());
            }
            "transport" => {
                self.transport = TransportKind::from_name(value).unwrap_or(self.transport);
            }
            "reader" => {
                self.reader = ReaderKind::from_name(value).unwrap_or(self.reader);
            }
            "prefix" => match parse_hex(value) {
                Some(prefix) => self.entry_prefix = prefix,
                None => warn!("Ignoring invalid prefix '{}' for principal {}", value, self.name),
            },
            "keywords" => self.keywords = Some(unescape(value)),
            "timeout" => {
                if let Some(timeout) = parse_seconds(value) {
                    self.timeout = Some(timeout);
                }
            }
            _ => warn!("Unknown principal option '{}'", field),
        }
    }
}

/// Presets for well known principals
pub fn builtin_presets() -> Vec<PrincipalPreset> {
    let mut nexuiz = PrincipalPreset::new("nexuiz", "dpmaster.deathmask.net", 27950, 3);
    nexuiz.game = Some("Nexuiz".into());

    let mut tremulous = PrincipalPreset::new("tremulous", "master.tremulous.net", 30710, 69);
    tremulous.reader = ReaderKind::Timeout;

    let mut cod4x = PrincipalPreset::new("cod4x", "cod4master.cod4x.me", 20810, 6);
    cod4x.transport = TransportKind::Stream;
    cod4x.entry_prefix = vec![0x00, 0x00, 0x00, 0x00, 0x04];
    cod4x.keywords = Some("full empty \0".into());
    cod4x.timeout = Some(Duration::from_secs(3));

    vec![
        PrincipalPreset::new("quake3", "master.quake3arena.com", 27950, 68),
        nexuiz,
        tremulous,
        PrincipalPreset::new("cod4", "cod4master.activision.com", 20810, 6),
        cod4x,
    ]
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout: PrincipalServer::DEFAULT_TIMEOUT,
            status_timeout: GameServer::DEFAULT_TIMEOUT,
            strip_colors: true,
            keywords: DEFAULT_KEYWORDS.into(),
            principals: builtin_presets(),
        }
    }
}

impl QueryConfig {
    /// Load configuration from an options file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(Self::parse(&content))
    }

    /// Load `q3query.txt` from the working directory, defaults when it is missing
    pub fn load_default() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse options file content
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key=value
            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim();

                config.parse_option(key, value);
            } else {
                warn!("Ignoring malformed line '{}'", line);
            }
        }

        config
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key {
            "timeout" => {
                self.timeout = parse_seconds(value).unwrap_or(self.timeout);
            }
            "statustimeout" => {
                self.status_timeout = parse_seconds(value).unwrap_or(self.status_timeout);
            }
            "stripcolors" => {
                self.strip_colors = value.parse().unwrap_or(true);
            }
            "keywords" => self.keywords = unescape(value),
            _ => match key.strip_prefix("principal.").and_then(|rest| rest.split_once('.')) {
                Some((name, field)) => self.principal_mut(name).set(field, value),
                None => warn!("Unknown option '{}'", key),
            },
        }
    }

    fn principal_mut(&mut self, name: &str) -> &mut PrincipalPreset {
        let index = match self.principals.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.principals.push(PrincipalPreset::new(name, "", 27950, 68));
                self.principals.len() - 1
            }
        };
        &mut self.principals[index]
    }

    /// Find a preset by name
    pub fn preset(&self, name: &str) -> Option<&PrincipalPreset> {
        self.principals.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Keywords to send to `preset`
    pub fn keywords_for<'a>(&'a self, preset: &'a PrincipalPreset) -> &'a str {
        preset.keywords.as_deref().unwrap_or(&self.keywords)
    }

    /// Timeout to use with `preset`
    pub fn timeout_for(&self, preset: &PrincipalPreset) -> Duration {
        preset.timeout.unwrap_or(self.timeout)
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Query configuration:");
        tracing::info!("  Principal timeout: {:?}", self.timeout);
        tracing::info!("  Status timeout: {:?}", self.status_timeout);
        tracing::info!("  Strip colours: {}", self.strip_colors);
        tracing::info!("  Keywords: {:?}", self.keywords);
        for p in &self.principals {
            tracing::info!(
                "  [{}] {}:{} protocol {} ({}, {} reader)",
                p.name,
                p.address,
                p.port,
                p.protocol,
                p.transport.as_str(),
                p.reader.as_str()
            );
        }
    }
}

/// Parse a positive number of seconds
fn parse_seconds(value: &str) -> Option<Duration> {
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        _ => {
            warn!("Ignoring invalid timeout '{}'", value);
            None
        }
    }
}

/// Parse hex bytes, `00 00 00 00 04`, `0000000004` and `\x00\x04` are accepted
pub fn parse_hex(value: &str) -> Option<Vec<u8>> {
    let digits: String = value
        .replace("\\x", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();

    if digits.len() % 2 != 0 {
        return None;
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}

// `\0` in a value stands for a nil byte
fn unescape(value: &str) -> String {
    value.replace("\\0", "\0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.status_timeout, Duration::from_millis(1500));
        assert!(config.strip_colors);
        assert_eq!(config.keywords, "full empty");
        assert_eq!(config.principals.len(), 5);
    }

    #[test]
    fn test_builtin_presets() {
        let config = QueryConfig::default();

        let quake3 = config.preset("quake3").unwrap();
        assert_eq!(quake3.address, "master.quake3arena.com");
        assert_eq!(quake3.protocol, 68);

        let nexuiz = config.preset("Nexuiz").unwrap();
        assert_eq!(nexuiz.game.as_deref(), Some("Nexuiz"));

        assert_eq!(config.preset("tremulous").unwrap().reader, ReaderKind::Timeout);

        let cod4x = config.preset("cod4x").unwrap();
        assert_eq!(cod4x.transport, TransportKind::Stream);
        assert_eq!(cod4x.entry_prefix, vec![0, 0, 0, 0, 4]);
        assert_eq!(config.keywords_for(cod4x), "full empty \0");
        assert_eq!(config.timeout_for(cod4x), Duration::from_secs(3));

        let cod4 = config.preset("cod4").unwrap();
        assert_eq!(config.keywords_for(cod4), "full empty");
        assert_eq!(config.timeout_for(cod4), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_simple_config() {
        let config_text = r#"
# query defaults
timeout = 2.5
statustimeout = 0.75
stripcolors = false
keywords = full
"#;
        let config = QueryConfig::parse(config_text);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.status_timeout, Duration::from_millis(750));
        assert!(!config.strip_colors);
        assert_eq!(config.keywords, "full");
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = QueryConfig::parse("timeout = -1\nstatustimeout = soon\nnot an option\n");
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.status_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_principal_overrides() {
        let config_text = r#"
principal.ioq3.address = master.ioquake3.org
principal.ioq3.port = 27951
principal.ioq3.protocol = 71
principal.ioq3.reader = timeout
principal.quake3.keywords = full empty\0
principal.cod4.transport = tcp
principal.cod4.prefix = 00 00 00 00 04
"#;
        let config = QueryConfig::parse(config_text);

        let ioq3 = config.preset("ioq3").unwrap();
        assert_eq!(ioq3.address, "master.ioquake3.org");
        assert_eq!(ioq3.port, 27951);
        assert_eq!(ioq3.protocol, 71);
        assert_eq!(ioq3.reader, ReaderKind::Timeout);
        assert_eq!(config.principals.len(), 6);

        let quake3 = config.preset("quake3").unwrap();
        assert_eq!(quake3.keywords.as_deref(), Some("full empty\0"));

        let cod4 = config.preset("cod4").unwrap();
        assert_eq!(cod4.transport, TransportKind::Stream);
        assert_eq!(cod4.entry_prefix, vec![0, 0, 0, 0, 4]);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("00 00 00 00 04"), Some(vec![0, 0, 0, 0, 4]));
        assert_eq!(parse_hex("\\x00\\xff"), Some(vec![0, 0xff]));
        assert_eq!(parse_hex("0a0B"), Some(vec![0x0a, 0x0b]));
        assert_eq!(parse_hex(""), Some(vec![]));
        assert_eq!(parse_hex("abc"), None);
        assert_eq!(parse_hex("zz"), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout = 3").unwrap();
        writeln!(file, "principal.quake3.port = 27951").unwrap();

        let config = QueryConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.preset("quake3").unwrap().port, 27951);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = QueryConfig::load_from_file(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }
}

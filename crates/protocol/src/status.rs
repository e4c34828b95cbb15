//! # Game server status protocol
//!
//! A game server answers `getstatus` with a single `statusResponse` packet:
//!
//! ```text
//! FF FF FF FF "statusResponse" 0A
//! ( "\" key "\" value )* 0A
//! ( frags " " ping " " '"' name '"' 0A )*
//! ```
//!
//! Medal of Honor servers insert a `01` byte after the packet marker and
//! leave out the frags column of the player list.

use q3query_core::{Player, QueryError, Result, ServerStatus, Variables};
use tracing::trace;

use crate::buffer::ByteBuffer;
use crate::PACKET_MARKER;

/// Response type tag following the packet marker
pub const STATUS_RESPONSE_TAG: &[u8] = b"statusResponse";

const FIELD_DELIMITER: &[u8] = b"\\";
const LINE_END: &[u8] = b"\n";

/// Game family a status query is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameVariant {
    /// Quake 3 and derived games (ioquake3, CoD, Tremulous, Nexuiz, ...)
    #[default]
    Quake3,
    /// Medal of Honor: Allied Assault and its expansions
    MedalOfHonor,
}

impl GameVariant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "quake3" | "q3" => Some(Self::Quake3),
            "mohaa" | "moh" | "medalofhonor" => Some(Self::MedalOfHonor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quake3 => "quake3",
            Self::MedalOfHonor => "mohaa",
        }
    }

    /// Build the `getstatus` request packet
    ///
    /// # Format
    /// - Quake3: `FF FF FF FF "getstatus" 00`
    /// - Medal of Honor: `FF FF FF FF 02 "getstatus xxx" 00`
    pub fn build_request(&self) -> Vec<u8> {
        let mut packet = PACKET_MARKER.to_vec();
        match self {
            Self::Quake3 => packet.extend_from_slice(b"getstatus"),
            Self::MedalOfHonor => {
                packet.push(0x02);
                packet.extend_from_slice(b"getstatus xxx");
            }
        }
        packet.push(0x00);
        packet
    }

    /// The exact header a response of this variant starts with
    pub fn response_header(&self) -> Vec<u8> {
        let mut header = PACKET_MARKER.to_vec();
        if *self == Self::MedalOfHonor {
            header.push(0x01);
        }
        header.extend_from_slice(STATUS_RESPONSE_TAG);
        header.extend_from_slice(LINE_END);
        header
    }

    /// Check and consume the response header
    pub fn consume_header(&self, buffer: &mut ByteBuffer) -> Result<()> {
        let header = self.response_header();
        if buffer.peek(header.len()) != header.as_slice() {
            return Err(QueryError::InvalidStatusHeader);
        }
        buffer.skip(header.len());
        Ok(())
    }

    /// Shortest line that can hold a player (`0 0 ""` / `0 ""`)
    pub fn min_player_line(&self) -> usize {
        match self {
            Self::Quake3 => 6,
            Self::MedalOfHonor => 4,
        }
    }

    /// Decode one player line, the cursor must be at its first byte
    pub fn parse_player(&self, buffer: &mut ByteBuffer, strip_colors: bool) -> Result<Player> {
        let frags = match self {
            Self::Quake3 => Some(read_number(buffer, "frags")?),
            Self::MedalOfHonor => None,
        };
        let ping = read_number(buffer, "ping")?;

        if buffer.peek(1) != b"\"" {
            return Err(QueryError::InvalidStatusBody("player name is not quoted".into()));
        }
        buffer.skip(1);
        let raw = buffer
            .read_delimited(&[b"\""], true, false)
            .map_err(|_| QueryError::InvalidStatusBody("player name is not terminated".into()))?;

        let (name, colored_name) = if strip_colors {
            (crate::color::strip_colors(&raw).into_owned(), Some(raw))
        } else {
            (raw, None)
        };

        Ok(Player {
            frags,
            ping,
            name,
            colored_name,
        })
    }
}

fn read_number(buffer: &mut ByteBuffer, field: &str) -> Result<i32> {
    let text = buffer
        .read_delimited(&[b" "], true, false)
        .map_err(|_| QueryError::InvalidStatusBody(format!("player {} is missing", field)))?;
    text.trim()
        .parse()
        .map_err(|_| QueryError::InvalidStatusBody(format!("player {} '{}' is not a number", field, text)))
}

/// Decoder for `statusResponse` packets
#[derive(Debug, Clone, Copy)]
pub struct StatusDecoder {
    variant: GameVariant,
    strip_colors: bool,
}

impl Default for StatusDecoder {
    fn default() -> Self {
        Self::new(GameVariant::default())
    }
}

impl StatusDecoder {
    pub fn new(variant: GameVariant) -> Self {
        Self {
            variant,
            strip_colors: true,
        }
    }

    /// Keep colour codes in values and player names
    pub fn strip_colors(mut self, strip: bool) -> Self {
        self.strip_colors = strip;
        self
    }

    /// Decode a complete status response received from `ip:port`
    pub fn decode(&self, buffer: &mut ByteBuffer, ip: &str, port: u16) -> Result<ServerStatus> {
        self.variant.consume_header(buffer)?;

        let variables = self.parse_variables(buffer)?;
        let players = self.parse_players(buffer)?;
        trace!(
            "Decoded status of {}:{}: {} variables, {} players",
            ip,
            port,
            variables.len(),
            players.len()
        );

        Ok(ServerStatus {
            ip: ip.to_string(),
            port,
            variables,
            players,
        })
    }

    /// Decode a raw status response packet
    pub fn parse_response(&self, data: &[u8], ip: &str, port: u16) -> Result<ServerStatus> {
        self.decode(&mut ByteBuffer::from(data), ip, port)
    }

    fn parse_variables(&self, buffer: &mut ByteBuffer) -> Result<Variables> {
        if buffer.peek(1) != FIELD_DELIMITER {
            return Err(QueryError::InvalidStatusBody(
                "server info does not start with a delimiter".into(),
            ));
        }

        let mut variables = Variables::new();
        while buffer.peek(1) == FIELD_DELIMITER {
            buffer.skip(1);
            let key = buffer
                .read_delimited(&[FIELD_DELIMITER, LINE_END], false, false)
                .map_err(|_| QueryError::InvalidStatusBody("server info is not terminated".into()))?;

            if buffer.peek(1) != FIELD_DELIMITER {
                return Err(QueryError::InvalidStatusBody(format!(
                    "variable '{}' has no value",
                    key
                )));
            }
            buffer.skip(1);

            let value = buffer
                .read_delimited(&[FIELD_DELIMITER, LINE_END], false, self.strip_colors)
                .map_err(|_| QueryError::InvalidStatusBody("server info is not terminated".into()))?;

            variables.insert(key, value);
        }

        if buffer.peek(1) != LINE_END {
            return Err(QueryError::InvalidStatusBody(
                "server info is not terminated by a newline".into(),
            ));
        }

        Ok(variables)
    }

    fn parse_players(&self, buffer: &mut ByteBuffer) -> Result<Vec<Player>> {
        let mut players = Vec::new();

        while buffer.peek(1) == LINE_END && buffer.has(1 + self.variant.min_player_line()) {
            buffer.skip(1);
            players.push(self.variant.parse_player(buffer, self.strip_colors)?);
        }

        Ok(players)
    }
}

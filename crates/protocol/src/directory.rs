//! # Principal (master) server protocol
//!
//! A principal answers `getservers` with one or more `getserversResponse`
//! packets. Each packet lists servers as a delimiter followed by four address
//! bytes and a big endian port:
//!
//! ```text
//! FF FF FF FF "getserversResponse" [filler] ( "\" ip ip ip ip port port )* ["\EOT" | "\EOF"]
//! ```
//!
//! Real principals deviate from this in several ways:
//! - Activision sends `\n\0` between the header and the first entry
//! - CoD4X prefixes every entry with `00 00 00 00 04`
//! - Some principals end every packet with `\EOT` and only the last with `\EOT\0`
//! - Tremulous sends no usable end marker at all

use std::collections::HashSet;

use q3query_core::{Endpoint, QueryError, Result};
use tracing::trace;

use crate::buffer::ByteBuffer;
use crate::PACKET_MARKER;

/// Response type tag following the packet marker
pub const DIRECTORY_RESPONSE_TAG: &[u8] = b"getserversResponse";

/// Separator in front of every server entry
pub const DEFAULT_DELIMITER: &[u8] = b"\\";

/// Always terminates the whole response
pub const EOF_MARKER: &[u8] = b"\\EOF";

/// Terminates a packet, and the response when followed by a nil byte
pub const EOT_MARKER: &[u8] = b"\\EOT";

/// Default `getservers` keywords: list full and empty servers too
pub const DEFAULT_KEYWORDS: &str = "full empty";

const ENTRY_LEN: usize = 6;

/// Build a `getservers` request
///
/// # Format
/// ```text
/// FF FF FF FF "getservers " [game " "] protocol [" " keywords]
/// ```
pub fn build_getservers_request(protocol: u32, game_name: Option<&str>, keywords: &str) -> Vec<u8> {
    let mut command = String::from("getservers ");
    if let Some(game) = game_name {
        command.push_str(game);
        command.push(' ');
    }
    command.push_str(&protocol.to_string());
    if !keywords.is_empty() {
        command.push(' ');
        command.push_str(keywords);
    }

    let mut packet = PACKET_MARKER.to_vec();
    packet.extend_from_slice(command.as_bytes());
    packet
}

fn response_header() -> Vec<u8> {
    let mut header = PACKET_MARKER.to_vec();
    header.extend_from_slice(DIRECTORY_RESPONSE_TAG);
    header
}

/// One received chunk split into its parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseChunk {
    /// Whether the chunk started with `FF FF FF FF getserversResponse`
    pub has_header: bool,
    /// Server entries, starting at the first delimiter
    pub body: Vec<u8>,
    /// End marker and everything after it
    pub tail: Vec<u8>,
}

impl ResponseChunk {
    /// Split a received chunk into header, body and tail
    ///
    /// # Arguments
    /// * `buffer` - The raw chunk, consumed entirely
    /// * `require_header` - Fail if the chunk does not start with a response header
    /// * `delimiter` - Entry delimiter, bytes between the header and its first
    ///   occurrence are skipped. Chunks without a header are stream
    ///   continuations and are taken as they are.
    pub fn split(buffer: &mut ByteBuffer, require_header: bool, delimiter: Option<&[u8]>) -> Result<Self> {
        let header = response_header();
        let has_header = buffer.peek(header.len()) == header.as_slice();
        if require_header && !has_header {
            return Err(QueryError::InvalidDirectoryData(
                "packet does not start with a getserversResponse header".into(),
            ));
        }
        if has_header {
            buffer.skip(header.len());
        }

        if let Some(delimiter) = delimiter.filter(|d| has_header && !d.is_empty()) {
            let mut filler = 0;
            while buffer.has(1) && buffer.peek(delimiter.len()) != delimiter {
                buffer.skip(1);
                filler += 1;
            }
            if filler > 0 {
                trace!("Skipped {} filler bytes before first entry", filler);
            }
        }

        let unread = buffer.unread();
        let consumed = unread.len();
        let body_len = (0..unread.len())
            .find(|&i| {
                let window = &unread[i..(i + 4).min(unread.len())];
                window == EOF_MARKER || window == EOT_MARKER
            })
            .unwrap_or(unread.len());

        let chunk = Self {
            has_header,
            body: unread[..body_len].to_vec(),
            tail: unread[body_len..].to_vec(),
        };
        buffer.skip(consumed);

        Ok(chunk)
    }

    /// Whether the tail marks the end of the entire response
    ///
    /// `\EOF` always does. `\EOT` only does when followed by a nil byte,
    /// a bare `\EOT` separates packets of a longer response.
    pub fn ends_response(&self) -> bool {
        self.tail.starts_with(EOF_MARKER) || self.tail.starts_with(b"\\EOT\0")
    }
}

/// Decoder for the entry list of a `getserversResponse`
pub struct DirectoryDecoder;

impl DirectoryDecoder {
    /// Decode server entries from an assembled response body
    ///
    /// Entries are read while at least one full entry (delimiter, prefix and
    /// six bytes) remains. Trailing bytes shorter than that are ignored.
    /// `0.0.0.0` and port 0 entries are dropped, as are repeated entries.
    pub fn parse(buffer: &mut ByteBuffer, delimiter: &[u8], entry_prefix: &[u8]) -> Result<Vec<Endpoint>> {
        let skip = delimiter.len() + entry_prefix.len();
        let mut seen = HashSet::new();
        let mut servers = Vec::new();

        while buffer.has(ENTRY_LEN + skip) {
            buffer.skip(skip);
            let ip = buffer.read_ipv4()?;
            let port = buffer.read_u16_be()?;

            let endpoint = Endpoint::new(ip, port);
            if endpoint.is_placeholder() {
                trace!("Ignoring placeholder entry {}", endpoint);
                continue;
            }
            if seen.insert(endpoint.clone()) {
                servers.push(endpoint);
            }
        }

        if buffer.has(1) {
            trace!("Ignoring {} trailing bytes", buffer.remaining());
        }

        Ok(servers)
    }

    /// Decode a single, complete `getserversResponse` packet
    pub fn parse_response(data: &[u8], delimiter: &[u8], entry_prefix: &[u8]) -> Result<Vec<Endpoint>> {
        let mut packet = ByteBuffer::from(data);
        let chunk = ResponseChunk::split(&mut packet, true, Some(delimiter))?;
        let mut body = ByteBuffer::from(chunk.body);
        Self::parse(&mut body, delimiter, entry_prefix)
    }
}

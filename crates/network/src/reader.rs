//! # Response Assembly
//!
//! A principal answers `getservers` with one or more chunks. The readers here
//! collect those chunks from a [`Transport`], strip each chunk's header and
//! tail, and concatenate the bodies into one buffer for the
//! [`DirectoryDecoder`](q3query_protocol::DirectoryDecoder).
//!
//! Two end-of-response policies exist because principals differ:
//!
//! - [`EofReader`] stops at an explicit end marker (`\EOF` or `\EOT\0`)
//! - [`TimeoutReader`] stops once packets get shorter or the peer goes quiet
//!
//! Over UDP every chunk is its own datagram and must carry the response
//! header. Over TCP only the first chunk does, later chunks are plain
//! continuations of the stream.

use crate::transport::Transport;
use q3query_core::{QueryError, Result, TransportKind};
use q3query_protocol::{ByteBuffer, ResponseChunk, EOF_MARKER};
use std::fmt;
use tracing::{debug, trace};

/// Policy for collecting a multi-chunk `getservers` response
pub trait ResponseReader: fmt::Debug {
    /// Read chunks until the response is complete and return the joined bodies
    fn read(&self, transport: &mut dyn Transport, delimiter: Option<&[u8]>) -> Result<ByteBuffer>;

    fn kind(&self) -> ReaderKind;
}

/// Reader selection by name, used by configuration and the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderKind {
    #[default]
    Eof,
    Timeout,
}

impl ReaderKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "eof" => Some(Self::Eof),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "eof",
            Self::Timeout => "timeout",
        }
    }

    pub fn build(&self) -> Box<dyn ResponseReader> {
        match self {
            Self::Eof => Box::new(EofReader),
            Self::Timeout => Box::new(TimeoutReader),
        }
    }
}

/// Reads until a chunk's tail carries an end marker
#[derive(Debug, Clone, Copy, Default)]
pub struct EofReader;

impl ResponseReader for EofReader {
    fn read(&self, transport: &mut dyn Transport, delimiter: Option<&[u8]>) -> Result<ByteBuffer> {
        let datagram = transport.kind() == TransportKind::Datagram;
        let mut response = ByteBuffer::new();
        let mut packets = 0usize;
        // Stream bytes that may start an end marker cut by the read boundary
        let mut held_back: Vec<u8> = Vec::new();

        loop {
            let data = transport.read()?;

            // Orderly shutdown of a stream ends the response as well
            if data.is_empty() && !datagram && packets > 0 {
                response.append(&held_back);
                debug!("Principal closed the stream after {} packets", packets);
                break;
            }

            let data = if held_back.is_empty() {
                data
            } else {
                let mut joined = std::mem::take(&mut held_back);
                joined.extend_from_slice(&data);
                joined
            };

            let mut chunk = ByteBuffer::from(data);
            let parts = ResponseChunk::split(&mut chunk, datagram || packets == 0, delimiter)?;
            packets += 1;
            trace!("Packet {}: {} body bytes, tail {:?}", packets, parts.body.len(), parts.tail);

            if parts.ends_response() {
                response.append(&parts.body);
                break;
            }

            let mut body = parts.body;
            if !datagram && parts.tail.is_empty() {
                let partial = partial_marker_len(&body);
                held_back = body.split_off(body.len() - partial);
            }
            response.append(&body);
        }

        debug!("Assembled {} bytes from {} packets", response.len(), packets);
        Ok(response)
    }

    fn kind(&self) -> ReaderKind {
        ReaderKind::Eof
    }
}

/// Length of the longest suffix of `body` that begins an end marker
///
/// `\EOF` and `\EOT` share their first three bytes.
fn partial_marker_len(body: &[u8]) -> usize {
    (1..EOF_MARKER.len())
        .rev()
        .find(|&n| body.ends_with(&EOF_MARKER[..n]))
        .unwrap_or(0)
}

/// Reads until a packet is shorter than the one before it
///
/// For principals that never send a usable end marker. A receive timeout
/// after the first packet ends the response, a timeout before it is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutReader;

impl ResponseReader for TimeoutReader {
    fn read(&self, transport: &mut dyn Transport, delimiter: Option<&[u8]>) -> Result<ByteBuffer> {
        let datagram = transport.kind() == TransportKind::Datagram;
        let mut response = ByteBuffer::new();
        let mut packets = 0usize;
        let mut last_length = 0usize;

        loop {
            let data = match transport.read() {
                Ok(data) => data,
                Err(QueryError::ReceiveTimeout) if packets > 0 => {
                    debug!("No further packets after {}", packets);
                    break;
                }
                Err(e) => return Err(e),
            };

            let length = data.len();
            let mut chunk = ByteBuffer::from(data);
            let parts = ResponseChunk::split(&mut chunk, datagram || packets == 0, delimiter)?;
            response.append(&parts.body);

            // Full packets share one size, the last one is usually short
            let shorter = packets > 0 && length < last_length;
            packets += 1;
            last_length = length;
            trace!("Packet {}: {} bytes", packets, length);

            if shorter {
                break;
            }
        }

        debug!("Assembled {} bytes from {} packets", response.len(), packets);
        Ok(response)
    }

    fn kind(&self) -> ReaderKind {
        ReaderKind::Timeout
    }
}

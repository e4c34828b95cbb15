//! # q3query Protocol Library
//!
//! This library decodes the connectionless query protocol spoken by Quake 3
//! and the games built on its network code (ioquake3, Call of Duty, Medal of
//! Honor, Tremulous, Nexuiz, ...).
//!
//! ## Architecture
//!
//! ### 1. Buffer Layer ([`buffer`])
//! A cursor based byte buffer. Transport code appends received chunks,
//! decoders read fixed width fields and delimited Latin-1 text from it.
//!
//! ### 2. Colour Codes ([`color`])
//! Removal of `^` colour escapes from names and server variables.
//!
//! ### 3. Principal Servers ([`directory`])
//! `getservers` request building, splitting of `getserversResponse` packets
//! into header/body/tail, and decoding of the six byte server entries.
//!
//! ### 4. Game Servers ([`status`])
//! `getstatus` request building and decoding of `statusResponse` packets for
//! the Quake 3 and Medal of Honor variants.
//!
//! ## Usage Example
//!
//! ```rust
//! use q3query_protocol::{DirectoryDecoder, DEFAULT_DELIMITER};
//!
//! let packet = b"\xff\xff\xff\xffgetserversResponse\\\x7f\x00\x00\x01\x6d\x38\\EOT";
//! let servers = DirectoryDecoder::parse_response(packet, DEFAULT_DELIMITER, b"").unwrap();
//! assert_eq!(servers[0].to_string(), "127.0.0.1:27960");
//! ```
//!
//! ## Packet Marker
//!
//! Every connectionless packet, in both directions, starts with four `0xFF`
//! bytes ([`PACKET_MARKER`]).

pub mod buffer;
pub mod color;
pub mod directory;
pub mod status;

// Re-export commonly used items
pub use buffer::*;
pub use color::*;
pub use directory::*;
pub use status::*;

/// Out-of-band packet marker in front of every request and response
pub const PACKET_MARKER: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF];

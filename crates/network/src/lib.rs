//! # q3query Networking Layer
//!
//! This crate provides blocking socket I/O for querying principal and game
//! servers.
//!
//! ## Modules
//!
//! - [`transport`] - Socket session with timeouts
//! - [`reader`] - Assembly of multi-packet principal responses
//! - [`principal`] - `getservers` client
//! - [`server`] - `getstatus` client

pub mod principal;
pub mod reader;
pub mod server;
pub mod transport;

// Re-export commonly used items
pub use principal::PrincipalServer;
pub use reader::{EofReader, ReaderKind, ResponseReader, TimeoutReader};
pub use server::GameServer;
pub use transport::{Connection, Transport, DEFAULT_TIMEOUT, MAX_DATAGRAM_SIZE};

//! # Principal Server Client
//!
//! Queries a principal (master) server for the list of registered game
//! servers.
//!
//! # Flow
//!
//! 1. Open a [`Connection`] with the configured transport kind
//! 2. Send `getservers <protocol> [keywords]`
//! 3. Collect the response with the configured [`ResponseReader`]
//! 4. Decode the entries with [`DirectoryDecoder`]
//!
//! The connection is closed when the query returns, on success and on error.

use crate::reader::{EofReader, ResponseReader};
use crate::transport::{Connection, Transport};
use q3query_core::{Endpoint, Result, TransportKind};
use q3query_protocol::{build_getservers_request, DirectoryDecoder, DEFAULT_DELIMITER};
use std::time::Duration;
use tracing::{debug, info};

/// Principal client
#[derive(Debug)]
pub struct PrincipalServer {
    address: String,
    port: u16,
    kind: TransportKind,
    entry_prefix: Vec<u8>,
    delimiter: Vec<u8>,
    reader: Box<dyn ResponseReader>,
}

impl PrincipalServer {
    /// Timeout used when a query does not set one
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// Client for a UDP principal with the end-marker reader
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            kind: TransportKind::Datagram,
            entry_prefix: Vec::new(),
            delimiter: DEFAULT_DELIMITER.to_vec(),
            reader: Box::new(EofReader),
        }
    }

    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.kind = kind;
        self
    }

    /// Bytes between the delimiter and the address of every entry
    pub fn entry_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.entry_prefix = prefix.into();
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn reader(mut self, reader: Box<dyn ResponseReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Fetch the server list
    ///
    /// # Arguments
    /// * `protocol` - Game protocol version the servers must speak
    /// * `game_name` - Game name for principals shared by several games
    /// * `keywords` - Filter keywords, usually `full empty`
    /// * `timeout` - Per socket operation, [`Self::DEFAULT_TIMEOUT`] when `None`
    pub fn get_servers(
        &self,
        protocol: u32,
        game_name: Option<&str>,
        keywords: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<Endpoint>> {
        let mut connection = Connection::new(self.address.as_str(), self.port, self.kind)
            .with_timeout(timeout.unwrap_or(Self::DEFAULT_TIMEOUT));

        self.query(&mut connection, protocol, game_name, keywords)
    }

    /// Run the query over an already created transport
    pub fn query(
        &self,
        transport: &mut dyn Transport,
        protocol: u32,
        game_name: Option<&str>,
        keywords: &str,
    ) -> Result<Vec<Endpoint>> {
        let request = build_getservers_request(protocol, game_name, keywords);
        debug!(
            "Querying principal {}:{} (protocol {}, {} reader)",
            self.address,
            self.port,
            protocol,
            self.reader.kind().as_str()
        );
        transport.write(&request)?;

        let mut body = self.reader.read(transport, Some(self.delimiter.as_slice()))?;
        let servers = DirectoryDecoder::parse(&mut body, &self.delimiter, &self.entry_prefix)?;

        info!("Principal {}:{} listed {} servers", self.address, self.port, servers.len());
        Ok(servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::TimeoutReader;
    use crate::transport::testing::ScriptedTransport;
    use q3query_core::QueryError;
    use std::net::UdpSocket;
    use std::thread;

    const HEADER: &[u8] = b"\xff\xff\xff\xffgetserversResponse";

    #[test]
    fn test_query_sends_request_and_decodes() {
        let reply = [HEADER, b"\\\x7f\x00\x00\x01\x6d\x38\\\x0a\x00\x00\x02\x6d\x39\\EOF"].concat();
        let mut transport = ScriptedTransport::new(TransportKind::Datagram).reply(&reply);

        let principal = PrincipalServer::new("master.quake3arena.com", 27950);
        let servers = principal.query(&mut transport, 68, None, "full empty").unwrap();

        assert_eq!(transport.written, vec![b"\xff\xff\xff\xffgetservers 68 full empty".to_vec()]);
        assert_eq!(servers, vec![Endpoint::new("127.0.0.1", 27960), Endpoint::new("10.0.0.2", 27961)]);
    }

    #[test]
    fn test_query_with_game_name() {
        let reply = [HEADER, b"\\EOT\0"].concat();
        let mut transport = ScriptedTransport::new(TransportKind::Datagram).reply(&reply);

        let principal = PrincipalServer::new("dpmaster.deathmask.net", 27950);
        let servers = principal.query(&mut transport, 3, Some("Nexuiz"), "full empty").unwrap();

        assert!(servers.is_empty());
        assert_eq!(transport.written[0], b"\xff\xff\xff\xffgetservers Nexuiz 3 full empty".to_vec());
    }

    #[test]
    fn test_query_stream_with_entry_prefix() {
        let mut transport = ScriptedTransport::new(TransportKind::Stream)
            .reply(&[HEADER, b"\x00\x00\\\x00\x00\x00\x00\x04\x7f\x00\x00\x01\x4e\x22"].concat())
            .reply(b"\\\x00\x00\x00\x00\x04\x0a\x00\x00\x02\x4e\x22\\EOF");

        let principal = PrincipalServer::new("cod4master.cod4x.me", 20810)
            .transport(TransportKind::Stream)
            .entry_prefix(b"\x00\x00\x00\x00\x04".to_vec());
        let servers = principal.query(&mut transport, 6, None, "full empty \0").unwrap();

        assert_eq!(servers, vec![Endpoint::new("127.0.0.1", 20002), Endpoint::new("10.0.0.2", 20002)]);
    }

    #[test]
    fn test_query_timeout_reader() {
        let mut transport = ScriptedTransport::new(TransportKind::Datagram)
            .reply(&[HEADER, b"\\\x7f\x00\x00\x01\x6d\x38"].concat());

        let principal = PrincipalServer::new("master.tremulous.net", 30710).reader(Box::new(TimeoutReader));
        let servers = principal.query(&mut transport, 69, None, "full empty").unwrap();
        assert_eq!(servers, vec![Endpoint::new("127.0.0.1", 27960)]);
    }

    #[test]
    fn test_query_rejects_foreign_packet() {
        let mut transport =
            ScriptedTransport::new(TransportKind::Datagram).reply(b"\xff\xff\xff\xffstatusResponse\n\\a\\b\n");

        let err = PrincipalServer::new("localhost", 27950)
            .query(&mut transport, 68, None, "full empty")
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidDirectoryData(_)));
    }

    #[test]
    fn test_get_servers_over_udp() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 256];
            let (n, from) = server.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"\xff\xff\xff\xffgetservers 68 full empty");

            let first = [HEADER, b"\\\x7f\x00\x00\x01\x6d\x38\\EOT"].concat();
            let second = [HEADER, b"\\\x0a\x00\x00\x02\x6d\x39\\EOT\0\0\0"].concat();
            server.send_to(&first, from).unwrap();
            server.send_to(&second, from).unwrap();
        });

        let servers = PrincipalServer::new("127.0.0.1", port)
            .get_servers(68, None, "full empty", Some(Duration::from_secs(2)))
            .unwrap();
        handle.join().unwrap();

        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].to_string(), "10.0.0.2:27961");
    }
}

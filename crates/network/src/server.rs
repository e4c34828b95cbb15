//! Game server status client

use crate::transport::{Connection, Transport};
use q3query_core::{Endpoint, Result, ServerStatus, TransportKind};
use q3query_protocol::{ByteBuffer, GameVariant, StatusDecoder};
use std::time::Duration;
use tracing::debug;

/// A single game server reachable over UDP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameServer {
    endpoint: Endpoint,
    variant: GameVariant,
}

impl GameServer {
    /// Timeout used when a query does not set one
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

    /// Quake 3 protocol server
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self::with_variant(ip, port, GameVariant::Quake3)
    }

    /// Medal of Honor server
    pub fn medal_of_honor(ip: impl Into<String>, port: u16) -> Self {
        Self::with_variant(ip, port, GameVariant::MedalOfHonor)
    }

    pub fn with_variant(ip: impl Into<String>, port: u16, variant: GameVariant) -> Self {
        Self {
            endpoint: Endpoint::new(ip, port),
            variant,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn variant(&self) -> GameVariant {
        self.variant
    }

    /// Send `getstatus` and decode the reply
    ///
    /// The reply is a single datagram, only one read is made.
    pub fn get_status(&self, strip_colors: bool, timeout: Option<Duration>) -> Result<ServerStatus> {
        let mut connection = Connection::new(self.endpoint.ip.as_str(), self.endpoint.port, TransportKind::Datagram)
            .with_timeout(timeout.unwrap_or(Self::DEFAULT_TIMEOUT));

        self.query(&mut connection, strip_colors)
    }

    /// Run the status query over an already created transport
    pub fn query(&self, transport: &mut dyn Transport, strip_colors: bool) -> Result<ServerStatus> {
        debug!("Querying status of {} ({})", self.endpoint, self.variant.as_str());
        transport.write(&self.variant.build_request())?;

        let mut response = ByteBuffer::from(transport.read()?);
        StatusDecoder::new(self.variant)
            .strip_colors(strip_colors)
            .decode(&mut response, &self.endpoint.ip, self.endpoint.port)
    }
}

impl From<Endpoint> for GameServer {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            variant: GameVariant::Quake3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use q3query_core::QueryError;
    use std::net::UdpSocket;
    use std::thread;

    #[test]
    fn test_query_quake3() {
        let reply = b"\xff\xff\xff\xffstatusResponse\n\\sv_hostname\\^1Test\\g_gametype\\0\n5 48 \"^2Player\"\n";
        let mut transport = ScriptedTransport::new(TransportKind::Datagram).reply(reply);

        let status = GameServer::new("127.0.0.1", 27960).query(&mut transport, true).unwrap();

        assert_eq!(transport.written, vec![b"\xff\xff\xff\xffgetstatus\x00".to_vec()]);
        assert_eq!(transport.reads, 1);
        assert_eq!(status.hostname(), Some("Test"));
        assert_eq!(status.players.len(), 1);
        assert_eq!(status.players[0].name, "Player");
        assert_eq!(status.players[0].frags, Some(5));
        assert_eq!(status.players[0].ping, 48);
    }

    #[test]
    fn test_query_medal_of_honor() {
        let reply = b"\xff\xff\xff\xff\x01statusResponse\n\\sv_hostname\\MOH\n30 \"Soldier\"\n";
        let mut transport = ScriptedTransport::new(TransportKind::Datagram).reply(reply);

        let server = GameServer::medal_of_honor("185.107.96.110", 12203);
        let status = server.query(&mut transport, true).unwrap();

        assert_eq!(transport.written[0], b"\xff\xff\xff\xff\x02getstatus xxx\x00".to_vec());
        assert_eq!(status.players[0].frags, None);
        assert_eq!(status.players[0].ping, 30);
    }

    #[test]
    fn test_query_timeout() {
        let mut transport = ScriptedTransport::new(TransportKind::Datagram);
        let err = GameServer::new("127.0.0.1", 27960).query(&mut transport, true).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_query_wrong_variant() {
        let reply = b"\xff\xff\xff\xffstatusResponse\n\\sv_hostname\\x\n";
        let mut transport = ScriptedTransport::new(TransportKind::Datagram).reply(reply);

        let err = GameServer::medal_of_honor("127.0.0.1", 12203)
            .query(&mut transport, true)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidStatusHeader));
    }

    #[test]
    fn test_from_endpoint() {
        let server = GameServer::from(Endpoint::new("10.0.0.1", 27960));
        assert_eq!(server.variant(), GameVariant::Quake3);
        assert_eq!(server.endpoint().to_string(), "10.0.0.1:27960");
    }

    #[test]
    fn test_get_status_over_udp() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (n, from) = socket.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"\xff\xff\xff\xffgetstatus\x00");
            socket
                .send_to(b"\xff\xff\xff\xffstatusResponse\n\\sv_hostname\\Loopback\\mapname\\q3dm17\n", from)
                .unwrap();
        });

        let status = GameServer::new("127.0.0.1", port)
            .get_status(false, Some(Duration::from_secs(2)))
            .unwrap();
        handle.join().unwrap();

        assert_eq!(status.port, port);
        assert_eq!(status.variables.get("mapname"), Some("q3dm17"));
        assert!(status.players.is_empty());
    }
}

//! # Socket Transport
//!
//! One [`Connection`] owns one socket to one server for its whole lifetime.
//!
//! # Lifecycle
//!
//! ```text
//! new() → (write | read) → connected → close() / drop
//!              ↓ connect fails
//!          not connected
//! ```
//!
//! The socket is opened lazily by the first `write` or `read`. Every blocking
//! operation is bounded by the configured timeout and reports a timeout with
//! its own error variant. Dropping the connection closes the socket, so early
//! returns through `?` never leak a descriptor.

use q3query_core::{QueryError, Result, TransportKind};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// Largest payload a single UDP datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// Timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

// Sockets reject a zero timeout
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Raw packet exchange with a single peer
///
/// Response readers only need these three operations, which keeps them
/// testable without sockets.
pub trait Transport {
    /// Socket type of the underlying connection
    fn kind(&self) -> TransportKind;

    /// Send the whole payload
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Block until one chunk arrives or the timeout elapses
    fn read(&mut self) -> Result<Vec<u8>>;
}

/// Socket session with a game or principal server
#[derive(Debug)]
pub struct Connection {
    address: String,
    port: u16,
    kind: TransportKind,
    timeout: Duration,
    socket: Option<Socket>,
    /// Stream peer performed an orderly shutdown
    peer_closed: bool,
}

impl Connection {
    /// Create an unconnected session
    pub fn new(address: impl Into<String>, port: u16, kind: TransportKind) -> Self {
        Self {
            address: address.into(),
            port,
            kind,
            timeout: DEFAULT_TIMEOUT,
            socket: None,
            peer_closed: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(MIN_TIMEOUT);
        self
    }

    /// Change the timeout, also for an already open socket
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout.max(MIN_TIMEOUT);
        if let Some(socket) = &self.socket {
            apply_timeout(socket, self.timeout).map_err(|e| self.connect_error(e))?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// `address:port` of the peer as configured
    pub fn peer(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Open the socket and connect it, does nothing when already connected
    pub fn connect(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        let addr = self.resolve()?;
        let (ty, protocol) = match self.kind {
            TransportKind::Datagram => (Type::DGRAM, Protocol::UDP),
            TransportKind::Stream => (Type::STREAM, Protocol::TCP),
        };

        // Dropped on every error below, which closes it
        let socket = Socket::new(Domain::IPV4, ty, Some(protocol)).map_err(|e| self.connect_error(e))?;
        apply_timeout(&socket, self.timeout).map_err(|e| self.connect_error(e))?;

        let target = SockAddr::from(addr);
        let connected = match self.kind {
            TransportKind::Stream => socket.connect_timeout(&target, self.timeout),
            TransportKind::Datagram => socket.connect(&target),
        };
        if let Err(e) = connected {
            debug!("Failed to connect to {}: {}", self.peer(), e);
            return Err(if is_timeout(&e) {
                QueryError::ConnectTimeout { address: self.peer() }
            } else {
                self.connect_error(e)
            });
        }

        debug!("Connected to {} ({}, timeout {:?})", addr, self.kind.as_str(), self.timeout);
        self.socket = Some(socket);
        self.peer_closed = false;
        Ok(())
    }

    /// Shut down and release the socket
    ///
    /// Returns whether there was a socket to close. Safe to call repeatedly.
    pub fn close(&mut self) -> bool {
        match self.socket.take() {
            Some(socket) => {
                // Connected UDP sockets may report ENOTCONN here
                let _ = socket.shutdown(Shutdown::Both);
                debug!("Closed connection to {}", self.peer());
                true
            }
            None => false,
        }
    }

    fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = (self.address.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.connect_error(e))?;

        addrs.find(SocketAddr::is_ipv4).ok_or_else(|| QueryError::Connect {
            address: self.peer(),
            reason: "no IPv4 address found".into(),
        })
    }

    fn connect_error(&self, e: io::Error) -> QueryError {
        QueryError::Connect {
            address: self.peer(),
            reason: e.to_string(),
        }
    }

    fn socket(&mut self) -> Result<&mut Socket> {
        self.connect()?;
        self.socket
            .as_mut()
            .ok_or_else(|| QueryError::Receive("socket is not connected".into()))
    }
}

impl Transport for Connection {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let kind = self.kind;
        let socket = self.socket()?;

        match kind {
            TransportKind::Datagram => {
                let sent = socket.send(data).map_err(|e| QueryError::Send(e.to_string()))?;
                if sent != data.len() {
                    return Err(QueryError::Send(format!("sent {} of {} bytes", sent, data.len())));
                }
            }
            TransportKind::Stream => {
                socket.write_all(data).map_err(|e| QueryError::Send(e.to_string()))?;
            }
        }

        trace!("Sent {} bytes: {:02X?}", data.len(), data);
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        if self.peer_closed {
            return Err(QueryError::Receive("connection closed by peer".into()));
        }

        let kind = self.kind;
        let socket = self.socket()?;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        let n = loop {
            match socket.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Err(QueryError::ReceiveTimeout),
                Err(e) => return Err(QueryError::Receive(e.to_string())),
            }
        };

        if n == 0 && kind == TransportKind::Stream {
            debug!("Peer closed the connection");
            self.peer_closed = true;
        }

        buf.truncate(n);
        trace!("Received {} bytes", n);
        Ok(buf)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn apply_timeout(socket: &Socket, timeout: Duration) -> io::Result<()> {
    socket.set_read_timeout(Some(timeout))?;
    socket.set_write_timeout(Some(timeout))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, UdpSocket};
    use std::thread;

    const SHORT: Duration = Duration::from_millis(200);

    #[test]
    fn test_udp_exchange() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (n, from) = server.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"\xff\xff\xff\xffgetstatus\x00");
            server.send_to(b"pong", from).unwrap();
        });

        let mut conn = Connection::new("127.0.0.1", port, TransportKind::Datagram).with_timeout(Duration::from_secs(2));
        assert!(!conn.is_connected());
        conn.write(b"\xff\xff\xff\xffgetstatus\x00").unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.read().unwrap(), b"pong".to_vec());

        handle.join().unwrap();
    }

    #[test]
    fn test_udp_receive_timeout() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();

        let mut conn = Connection::new("127.0.0.1", port, TransportKind::Datagram).with_timeout(SHORT);
        conn.write(b"ping").unwrap();
        let err = conn.read().unwrap_err();
        assert!(matches!(err, QueryError::ReceiveTimeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_tcp_read_until_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"hello").unwrap();
        });

        let mut conn = Connection::new("127.0.0.1", port, TransportKind::Stream).with_timeout(Duration::from_secs(2));
        conn.connect().unwrap();
        handle.join().unwrap();

        assert_eq!(conn.read().unwrap(), b"hello".to_vec());
        assert_eq!(conn.read().unwrap(), Vec::<u8>::new());
        assert!(matches!(conn.read(), Err(QueryError::Receive(_))));
    }

    #[test]
    fn test_tcp_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut conn = Connection::new("127.0.0.1", port, TransportKind::Stream).with_timeout(SHORT);
        let err = conn.connect().unwrap_err();
        assert!(matches!(err, QueryError::Connect { .. } | QueryError::ConnectTimeout { .. }));
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_close_is_idempotent() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();

        let mut conn = Connection::new("127.0.0.1", port, TransportKind::Datagram);
        assert!(!conn.close());
        conn.connect().unwrap();
        conn.connect().unwrap();
        assert!(conn.close());
        assert!(!conn.close());
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_set_timeout_on_open_socket() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();

        let mut conn = Connection::new("127.0.0.1", port, TransportKind::Datagram);
        assert_eq!(conn.timeout(), DEFAULT_TIMEOUT);
        conn.connect().unwrap();
        conn.set_timeout(Duration::ZERO).unwrap();
        assert_eq!(conn.timeout(), MIN_TIMEOUT);
        assert!(matches!(conn.read(), Err(QueryError::ReceiveTimeout)));
    }
}

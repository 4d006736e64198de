// UDP request/reply transport.
//
// Every exchange opens its own socket, sends one 64-byte request and waits
// for one reply, so concurrent callers share no mutable state.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::codec::Request;
use crate::error::Error;

/// Default UDP port controllers listen on for commands.
pub const DEFAULT_PORT: u16 = 60000;

/// Default UDP port controllers push event notifications to.
pub const DEFAULT_LISTEN_PORT: u16 = 60001;

const RECV_BUFFER: usize = 1024;

/// Socket addressing and timeout settings shared by every exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Local address each request socket binds to.
    pub bind: SocketAddr,
    /// Destination for controllers without a unicast address.
    pub broadcast: SocketAddr,
    /// Local endpoint for pushed event notifications.
    pub listen: SocketAddr,
    /// Per-call reply timeout.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            broadcast: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), DEFAULT_PORT),
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_LISTEN_PORT),
            timeout: Duration::from_secs(1),
        }
    }
}

/// Parse `host:port`, or a bare IPv4 address with `default_port` appended.
pub fn parse_addr(s: &str, default_port: u16) -> Result<SocketAddr, Error> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, default_port))
        .map_err(|_| Error::InvalidAddress(s.to_owned()))
}

/// Connectionless UDP transport.
#[derive(Debug, Clone, Default)]
pub struct UdpTransport {
    config: TransportConfig,
}

impl UdpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send `request` to `dest` (or the broadcast address) and return the
    /// first datagram received before the per-call timeout.
    pub async fn send(&self, request: &Request, dest: Option<SocketAddr>) -> Result<Vec<u8>, Error> {
        let dest = dest.unwrap_or(self.config.broadcast);
        let socket = UdpSocket::bind(self.config.bind).await?;
        socket.set_broadcast(true)?;

        tracing::trace!(
            controller = request.controller,
            function = format_args!("0x{:02x}", request.function.code()),
            %dest,
            "sending request"
        );
        socket.send_to(&request.packet, dest).await?;

        let mut buf = vec![0u8; RECV_BUFFER];
        let (len, from) = tokio::time::timeout(self.config.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| Error::Timeout {
                controller: request.controller,
                timeout_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        tracing::trace!(controller = request.controller, %from, len, "received reply");
        buf.truncate(len);
        Ok(buf)
    }
}

//! Minimal DHCP client: one DISCOVER/OFFER/REQUEST/ACK exchange per
//! [`DhcpClient::get_lease`] call.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use chrono::Utc;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::lease::Lease;
use crate::mac::MacAddr;
use crate::options::{DhcpOption, MessageType, OptionList};
use crate::packet::{BOOTREPLY, DhcpPacket};

pub const DHCP_SERVER_PORT: u16 = 67;
pub const DHCP_CLIENT_PORT: u16 = 68;
const RECV_BUFFER_SIZE: usize = 4096;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client socket configuration.
///
/// The port fields exist for relayed setups and test harnesses; real
/// exchanges use the standard 68/67 pair.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Interface to bind the socket to (`SO_BINDTODEVICE`, Linux only).
    pub interface: Option<String>,
    pub bind_address: Ipv4Addr,
    pub client_port: u16,
    pub server_port: u16,
    /// Deadline for each reply wait (OFFER, ACK). No internal retries; a
    /// missed deadline surfaces as [`Error::Timeout`].
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interface: None,
            bind_address: Ipv4Addr::UNSPECIFIED,
            client_port: DHCP_CLIENT_PORT,
            server_port: DHCP_SERVER_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct DhcpClient {
    config: ClientConfig,
}

impl DhcpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn with_interface(interface: impl Into<String>) -> Self {
        Self::new(ClientConfig {
            interface: Some(interface.into()),
            ..ClientConfig::default()
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn create_socket(&self) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|error| Error::Socket(format!("failed to create socket: {}", error)))?;

        socket
            .set_reuse_address(true)
            .map_err(|error| Error::Socket(format!("failed to set SO_REUSEADDR: {}", error)))?;

        socket
            .set_broadcast(true)
            .map_err(|error| Error::Socket(format!("failed to set SO_BROADCAST: {}", error)))?;

        socket
            .set_nonblocking(true)
            .map_err(|error| Error::Socket(format!("failed to set non-blocking: {}", error)))?;

        if let Some(interface) = self.config.interface.as_deref() {
            #[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
            {
                socket.bind_device(Some(interface.as_bytes())).map_err(|error| {
                    Error::Socket(format!("failed to bind to device {interface}: {error}"))
                })?;
                debug!(interface, "socket bound to device");
            }
            #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "fuchsia")))]
            {
                tracing::warn!(
                    interface,
                    "interface-scoped binding is unsupported on this platform and will be ignored"
                );
            }
        }

        let bind_addr = SocketAddrV4::new(self.config.bind_address, self.config.client_port);
        socket.bind(&bind_addr.into()).map_err(|error| {
            Error::Socket(format!("failed to bind to {}: {}", bind_addr, error))
        })?;

        let std_socket: std::net::UdpSocket = socket.into();
        UdpSocket::from_std(std_socket).map_err(|error| {
            Error::Socket(format!("failed to convert to tokio socket: {}", error))
        })
    }

    /// Runs one full DORA exchange and returns the resulting [`Lease`].
    ///
    /// Draws a fresh xid, sends DISCOVER to the server (or the broadcast
    /// address), takes the first matching OFFER, then sends REQUEST and
    /// waits for the ACK. Collecting and ranking multiple OFFERs is not
    /// attempted. The socket lives for the duration of this call only.
    pub async fn get_lease(
        &self,
        mac_addr: MacAddr,
        broadcast: bool,
        relay: Option<Ipv4Addr>,
        server: Ipv4Addr,
        extra_options: Option<OptionList>,
    ) -> Result<Lease> {
        let socket = self.create_socket()?;
        let start = Instant::now();

        let destination = SocketAddrV4::new(
            if broadcast { Ipv4Addr::BROADCAST } else { server },
            self.config.server_port,
        );

        let discover =
            DhcpPacket::discover(mac_addr, None, broadcast, relay, extra_options.clone());
        let xid = discover.xid;

        socket.send_to(&discover.as_bytes(), destination).await?;
        info!(xid, mac = %mac_addr, %destination, "sent DHCPDISCOVER");

        let (offer, offer_source) = self
            .await_reply(&socket, xid, mac_addr, MessageType::Offer, "OFFER")
            .await?;
        let server_id = offer.server_identifier().ok_or_else(|| {
            Error::ProtocolViolation("OFFER is missing the ServerIdentifier option".to_string())
        })?;
        info!(yiaddr = %offer.yiaddr, server = %server_id, source = %offer_source, "received DHCPOFFER");

        let mut request_options = extra_options.unwrap_or_default();
        request_options.append(DhcpOption::server_identifier(server_id));
        request_options.append(DhcpOption::requested_ip_address(offer.yiaddr));

        let secs = start.elapsed().as_secs().min(u16::MAX as u64) as u16;
        let request =
            DhcpPacket::request(mac_addr, xid, secs, broadcast, relay, Some(request_options));

        socket.send_to(&request.as_bytes(), destination).await?;
        info!(requested = %offer.yiaddr, "sent DHCPREQUEST");

        let (ack, ack_source) = self
            .await_reply(&socket, xid, mac_addr, MessageType::Ack, "ACK")
            .await?;
        info!(yiaddr = %ack.yiaddr, source = %ack_source, "received DHCPACK");

        Ok(Lease {
            discover,
            offer,
            request,
            ack,
            elapsed: start.elapsed(),
            server: ack_source,
            obtained_at: Utc::now(),
        })
    }

    /// Reads datagrams until one is a BOOTREPLY of the expected type for
    /// our xid and hardware address, or the deadline passes. Everything
    /// else on the wire is discarded silently; a matching DHCPNAK aborts
    /// the exchange.
    async fn await_reply(
        &self,
        socket: &UdpSocket,
        xid: u32,
        mac_addr: MacAddr,
        expected: MessageType,
        phase: &'static str,
    ) -> Result<(DhcpPacket, SocketAddr)> {
        let deadline = Instant::now() + self.config.timeout;
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(Error::Timeout(phase))?;

            let (size, source) =
                match tokio::time::timeout(remaining, socket.recv_from(&mut buffer)).await {
                    Ok(received) => received?,
                    Err(_) => return Err(Error::Timeout(phase)),
                };

            let packet = match DhcpPacket::from_bytes(&buffer[..size]) {
                Ok(packet) => packet,
                Err(error) => {
                    debug!(%source, %error, "discarding undecodable datagram");
                    continue;
                }
            };

            if packet.xid != xid {
                debug!(got = packet.xid, want = xid, "discarding reply with foreign xid");
                continue;
            }
            if packet.op != BOOTREPLY {
                debug!(op = packet.op, "discarding non-reply packet");
                continue;
            }
            if packet.chaddr[..6] != mac_addr.octets() {
                debug!(chaddr = %packet.mac_address(), "discarding reply for another client");
                continue;
            }

            match packet.message_type() {
                Some(message_type) if message_type == expected => {
                    return Ok((packet, source));
                }
                Some(MessageType::Nak) => {
                    let message = packet.options.by_code(56).and_then(DhcpOption::as_string);
                    return Err(Error::Nak(message));
                }
                other => {
                    debug!(?other, expected = %expected, "discarding reply of unexpected type");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.client_port, 68);
        assert_eq!(config.server_port, 67);
        assert_eq!(config.bind_address, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.interface.is_none());
    }

    #[test]
    fn test_with_interface() {
        let client = DhcpClient::with_interface("eth0");
        assert_eq!(client.config().interface.as_deref(), Some("eth0"));
        assert_eq!(client.config().client_port, 68);
    }
}

//! The outcome of a successful DORA exchange.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::options::DhcpOption;
use crate::packet::DhcpPacket;

/// An acquired lease: all four packets of the exchange plus timing and the
/// responding server's endpoint. Immutable once returned.
///
/// Renewal and rebinding times are surfaced as metadata only; acting on
/// them is up to the caller.
#[derive(Debug, Clone)]
pub struct Lease {
    pub discover: DhcpPacket,
    pub offer: DhcpPacket,
    pub request: DhcpPacket,
    pub ack: DhcpPacket,
    /// Wall-clock time from sending DISCOVER to receiving ACK.
    pub elapsed: Duration,
    /// Socket address the ACK arrived from.
    pub server: SocketAddr,
    pub obtained_at: DateTime<Utc>,
}

impl Lease {
    /// The address the server committed to, from the ACK's `yiaddr`.
    pub fn address(&self) -> Ipv4Addr {
        self.ack.yiaddr
    }

    pub fn xid(&self) -> u32 {
        self.ack.xid
    }

    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        self.ack.server_identifier()
    }

    pub fn lease_time(&self) -> Option<u32> {
        self.ack.lease_time()
    }

    pub fn renewal_time(&self) -> Option<u32> {
        self.ack.options.by_code(58).and_then(DhcpOption::as_u32)
    }

    pub fn rebinding_time(&self) -> Option<u32> {
        self.ack.options.by_code(59).and_then(DhcpOption::as_u32)
    }

    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        self.ack.options.by_code(1).and_then(DhcpOption::as_ip)
    }

    pub fn routers(&self) -> Option<Vec<Ipv4Addr>> {
        self.ack.options.by_code(3).and_then(DhcpOption::as_ip_list)
    }

    pub fn dns_servers(&self) -> Option<Vec<Ipv4Addr>> {
        self.ack.options.by_code(6).and_then(DhcpOption::as_ip_list)
    }

    pub fn summary(&self) -> LeaseSummary {
        LeaseSummary {
            address: self.address(),
            mac_address: self.ack.mac_address(),
            server: self.server,
            server_identifier: self.server_identifier(),
            subnet_mask: self.subnet_mask(),
            routers: self.routers().unwrap_or_default(),
            dns_servers: self.dns_servers().unwrap_or_default(),
            lease_time_seconds: self.lease_time(),
            renewal_time_seconds: self.renewal_time(),
            rebinding_time_seconds: self.rebinding_time(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            obtained_at: self.obtained_at,
        }
    }
}

impl fmt::Display for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} for {} ({} ms)",
            self.address(),
            self.server,
            self.ack.mac_address(),
            self.elapsed.as_millis()
        )
    }
}

/// Flat, serializable view of a lease for CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct LeaseSummary {
    pub address: Ipv4Addr,
    pub mac_address: String,
    pub server: SocketAddr,
    pub server_identifier: Option<Ipv4Addr>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub routers: Vec<Ipv4Addr>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub lease_time_seconds: Option<u32>,
    pub renewal_time_seconds: Option<u32>,
    pub rebinding_time_seconds: Option<u32>,
    pub elapsed_ms: u64,
    pub obtained_at: DateTime<Utc>,
}

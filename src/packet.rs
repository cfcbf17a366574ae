use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::mac::{MacAddr, format_hwaddr};
use crate::options::{self, DhcpOption, MessageType, OPTION_END, OPTION_PAD, OptionList};

pub const DHCP_MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
pub const BOOTREQUEST: u8 = 1;
pub const BOOTREPLY: u8 = 2;
pub const HTYPE_ETHERNET: u8 = 1;
pub const HLEN_ETHERNET: u8 = 6;
pub const BROADCAST_FLAG: u16 = 0x8000;

/// Fixed header length including the magic cookie.
const FIXED_HEADER_SIZE: usize = 240;
const COOKIE_OFFSET: usize = 236;
/// Many servers drop frames shorter than this; encodes are zero-padded up.
const MIN_PACKET_SIZE: usize = 300;

fn op_name(op: u8) -> &'static str {
    match op {
        BOOTREQUEST => "BOOTREQUEST",
        BOOTREPLY => "BOOTREPLY",
        _ => "UNKNOWN",
    }
}

/// A BOOTP/DHCP frame: the 236-octet fixed header, the magic cookie, and
/// the option trailer.
///
/// PAD options are dropped on decode and the END sentinel is implicit; the
/// encoder always emits exactly one 0xFF after the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpPacket {
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; 16],
    pub sname: [u8; 64],
    pub file: [u8; 128],
    pub options: OptionList,
}

impl DhcpPacket {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(Error::MalformedPacket(format!(
                "packet too short: {} bytes (minimum {FIXED_HEADER_SIZE})",
                data.len()
            )));
        }

        if data[COOKIE_OFFSET..FIXED_HEADER_SIZE] != DHCP_MAGIC_COOKIE {
            return Err(Error::MalformedPacket("invalid magic cookie".to_string()));
        }

        let op = data[0];
        let htype = data[1];
        let hlen = data[2];
        let hops = data[3];

        if hlen > 16 {
            return Err(Error::MalformedPacket(format!(
                "hardware address length {hlen} exceeds chaddr field"
            )));
        }

        let xid = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let secs = u16::from_be_bytes([data[8], data[9]]);
        let flags = u16::from_be_bytes([data[10], data[11]]);

        let ciaddr = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        let yiaddr = Ipv4Addr::new(data[16], data[17], data[18], data[19]);
        let siaddr = Ipv4Addr::new(data[20], data[21], data[22], data[23]);
        let giaddr = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&data[28..44]);

        let mut sname = [0u8; 64];
        sname.copy_from_slice(&data[44..108]);

        let mut file = [0u8; 128];
        file.copy_from_slice(&data[108..236]);

        let options = Self::parse_options(data)?;

        Ok(Self {
            op,
            htype,
            hlen,
            hops,
            xid,
            secs,
            flags,
            ciaddr,
            yiaddr,
            siaddr,
            giaddr,
            chaddr,
            sname,
            file,
            options,
        })
    }

    /// Walks the option trailer until END or end of buffer. PAD is
    /// consumed but not retained; consecutive TLVs with the same code are
    /// concatenated (RFC 3396) before being stored.
    fn parse_options(data: &[u8]) -> Result<OptionList> {
        let mut list = OptionList::new();
        let mut pending: Option<DhcpOption> = None;
        let mut offset = FIXED_HEADER_SIZE;

        while offset < data.len() {
            let (option, next) = options::decode_one(data, offset)?;
            offset = next;

            match option.code() {
                OPTION_PAD => continue,
                OPTION_END => break,
                _ => {}
            }

            match pending.as_mut() {
                Some(previous) if previous.code() == option.code() => {
                    previous.extend_data(option.data());
                }
                _ => {
                    if let Some(done) = pending.take() {
                        list.append(done);
                    }
                    pending = Some(option);
                }
            }
        }

        if let Some(done) = pending {
            list.append(done);
        }

        Ok(list)
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(MIN_PACKET_SIZE);

        packet.push(self.op);
        packet.push(self.htype);
        packet.push(self.hlen);
        packet.push(self.hops);

        packet.extend_from_slice(&self.xid.to_be_bytes());
        packet.extend_from_slice(&self.secs.to_be_bytes());
        packet.extend_from_slice(&self.flags.to_be_bytes());

        packet.extend_from_slice(&self.ciaddr.octets());
        packet.extend_from_slice(&self.yiaddr.octets());
        packet.extend_from_slice(&self.siaddr.octets());
        packet.extend_from_slice(&self.giaddr.octets());

        packet.extend_from_slice(&self.chaddr);
        packet.extend_from_slice(&self.sname);
        packet.extend_from_slice(&self.file);

        packet.extend_from_slice(&DHCP_MAGIC_COOKIE);

        for option in &self.options {
            packet.extend_from_slice(&option.as_bytes());
        }

        packet.push(OPTION_END);

        while packet.len() < MIN_PACKET_SIZE {
            packet.push(0);
        }

        packet
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.options.by_code(53).and_then(DhcpOption::as_message_type)
    }

    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        self.options.by_code(54).and_then(DhcpOption::as_ip)
    }

    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.options.by_code(50).and_then(DhcpOption::as_ip)
    }

    pub fn lease_time(&self) -> Option<u32> {
        self.options.by_code(51).and_then(DhcpOption::as_u32)
    }

    pub fn hostname(&self) -> Option<String> {
        self.options.by_code(12).and_then(DhcpOption::as_string)
    }

    /// The hardware address as uppercase colon hex, rendered from the
    /// first `hlen` octets of `chaddr`.
    pub fn mac_address(&self) -> String {
        let hlen = (self.hlen as usize).min(self.chaddr.len());
        format_hwaddr(&self.chaddr[..hlen])
    }

    pub fn is_broadcast(&self) -> bool {
        (self.flags & BROADCAST_FLAG) != 0
    }

    fn template(
        op: u8,
        message_type: MessageType,
        mac_addr: MacAddr,
        xid: u32,
        secs: u16,
        broadcast: bool,
        relay: Option<Ipv4Addr>,
        yiaddr: Ipv4Addr,
        extra_options: Option<OptionList>,
    ) -> Self {
        let mut option_list = extra_options.unwrap_or_default();
        option_list.insert(0, DhcpOption::message_type(message_type));

        // A relay expects unicast replies, so giaddr and the broadcast
        // flag are mutually exclusive.
        let flags = if broadcast && relay.is_none() {
            BROADCAST_FLAG
        } else {
            0
        };

        Self {
            op,
            htype: HTYPE_ETHERNET,
            hlen: HLEN_ETHERNET,
            hops: 0,
            xid,
            secs,
            flags,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: relay.unwrap_or(Ipv4Addr::UNSPECIFIED),
            chaddr: mac_addr.as_chaddr(),
            sname: [0u8; 64],
            file: [0u8; 128],
            options: option_list,
        }
    }

    /// Baseline DISCOVER. Draws a random xid when none is supplied.
    pub fn discover(
        mac_addr: MacAddr,
        xid: Option<u32>,
        broadcast: bool,
        relay: Option<Ipv4Addr>,
        extra_options: Option<OptionList>,
    ) -> Self {
        Self::template(
            BOOTREQUEST,
            MessageType::Discover,
            mac_addr,
            xid.unwrap_or_else(rand::random),
            0,
            broadcast,
            relay,
            Ipv4Addr::UNSPECIFIED,
            extra_options,
        )
    }

    /// Baseline OFFER carrying the proposed address in `yiaddr`.
    pub fn offer(
        mac_addr: MacAddr,
        xid: u32,
        yiaddr: Ipv4Addr,
        broadcast: bool,
        relay: Option<Ipv4Addr>,
        extra_options: Option<OptionList>,
    ) -> Self {
        Self::template(
            BOOTREPLY,
            MessageType::Offer,
            mac_addr,
            xid,
            0,
            broadcast,
            relay,
            yiaddr,
            extra_options,
        )
    }

    /// Baseline REQUEST. `secs` reports time since acquisition began.
    pub fn request(
        mac_addr: MacAddr,
        xid: u32,
        secs: u16,
        broadcast: bool,
        relay: Option<Ipv4Addr>,
        extra_options: Option<OptionList>,
    ) -> Self {
        Self::template(
            BOOTREQUEST,
            MessageType::Request,
            mac_addr,
            xid,
            secs,
            broadcast,
            relay,
            Ipv4Addr::UNSPECIFIED,
            extra_options,
        )
    }

    /// Baseline ACK carrying the committed address in `yiaddr`.
    pub fn ack(
        mac_addr: MacAddr,
        xid: u32,
        yiaddr: Ipv4Addr,
        broadcast: bool,
        relay: Option<Ipv4Addr>,
        extra_options: Option<OptionList>,
    ) -> Self {
        Self::template(
            BOOTREPLY,
            MessageType::Ack,
            mac_addr,
            xid,
            0,
            broadcast,
            relay,
            yiaddr,
            extra_options,
        )
    }
}

impl fmt::Display for DhcpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message_type = self
            .message_type()
            .map(MessageType::name)
            .unwrap_or("UNKNOWN MSG TYPE");
        let cast = if self.is_broadcast() {
            "BROADCAST"
        } else {
            "UNICAST"
        };
        writeln!(f, "{} / {} / {}", op_name(self.op), message_type, cast)?;
        writeln!(f, "xid 0x{:08X} / {} seconds elapsed", self.xid, self.secs)?;
        writeln!(f, "client:      {} ({})", self.mac_address(), self.ciaddr)?;
        writeln!(f, "your addr:   {}", self.yiaddr)?;
        writeln!(f, "next server: {}", self.siaddr)?;
        writeln!(f, "relay:       {}", self.giaddr)?;
        let options_json = serde_json::to_string_pretty(&self.options.as_json())
            .unwrap_or_else(|_| "{}".to_string());
        write!(f, "options: {options_json}")
    }
}

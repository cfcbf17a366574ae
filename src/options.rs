//! DHCP option codec.
//!
//! Every option defined in RFC 2132 is described by an entry in a static
//! registry keyed on the option code. Each entry names the option's
//! canonical snake_case key and its wire grammar; encode, decode, and the
//! human-readable projection all dispatch on the grammar rather than on a
//! per-code type.
//!
//! The human-readable projection is a single-key [`serde_json::Value`]
//! object, e.g. `{"subnet_mask": "255.255.255.0"}` or
//! `{"client_identifier": {"hwtype": 1, "hwaddr": "8C:45:00:45:12:09"}}`.
//! `value()` and [`value_to_object`] are inverses on valid inputs; codes
//! missing from the registry project as `{"unknown_<code>": "0xAB 0xCD"}`
//! and round-trip their raw bytes untouched.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::mac::{format_hwaddr, parse_hwaddr};

pub const OPTION_PAD: u8 = 0;
pub const OPTION_END: u8 = 255;

/// Maximum payload of a single TLV; longer payloads are split across
/// consecutive same-code TLVs per RFC 3396.
const MAX_TLV_DATA: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl MessageType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Discover => "DHCPDISCOVER",
            Self::Offer => "DHCPOFFER",
            Self::Request => "DHCPREQUEST",
            Self::Decline => "DHCPDECLINE",
            Self::Ack => "DHCPACK",
            Self::Nak => "DHCPNAK",
            Self::Release => "DHCPRELEASE",
            Self::Inform => "DHCPINFORM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DHCPDISCOVER" => Some(Self::Discover),
            "DHCPOFFER" => Some(Self::Offer),
            "DHCPREQUEST" => Some(Self::Request),
            "DHCPDECLINE" => Some(Self::Decline),
            "DHCPACK" => Some(Self::Ack),
            "DHCPNAK" => Some(Self::Nak),
            "DHCPRELEASE" => Some(Self::Release),
            "DHCPINFORM" => Some(Self::Inform),
            _ => None,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Wire grammar of an option payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    U8,
    U16,
    U32,
    I32,
    U8List,
    U16List,
    Bool,
    Ip,
    IpList,
    /// Pairs of IPv4 addresses; the strings name the two halves in the
    /// projection (`address`/`mask` for 21, `destination`/`router` for 33).
    IpPairs {
        first: &'static str,
        second: &'static str,
    },
    Str,
    Hex,
    MessageType,
    ClientIdentifier,
    NetbiosNodeType,
    Overload,
}

#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub code: u8,
    pub key: &'static str,
    pub grammar: Grammar,
}

const fn spec(code: u8, key: &'static str, grammar: Grammar) -> OptionSpec {
    OptionSpec { code, key, grammar }
}

/// Every option from RFC 2132 (codes 1-61 and 64-76) plus relay agent
/// information (82). PAD and END are structural and handled outside the
/// registry.
pub static REGISTRY: &[OptionSpec] = &[
    spec(1, "subnet_mask", Grammar::Ip),
    spec(2, "time_offset_s", Grammar::I32),
    spec(3, "routers", Grammar::IpList),
    spec(4, "time_servers", Grammar::IpList),
    spec(5, "name_servers", Grammar::IpList),
    spec(6, "dns_servers", Grammar::IpList),
    spec(7, "log_servers", Grammar::IpList),
    spec(8, "cookie_servers", Grammar::IpList),
    spec(9, "lpr_servers", Grammar::IpList),
    spec(10, "impress_servers", Grammar::IpList),
    spec(11, "resource_location_servers", Grammar::IpList),
    spec(12, "hostname", Grammar::Str),
    spec(13, "bootfile_size", Grammar::U16),
    spec(14, "merit_dump_file", Grammar::Str),
    spec(15, "domain_name", Grammar::Str),
    spec(16, "swap_server", Grammar::Ip),
    spec(17, "root_path", Grammar::Str),
    spec(18, "extensions_path", Grammar::Str),
    spec(19, "ip_forwarding", Grammar::Bool),
    spec(20, "non_local_source_routing", Grammar::Bool),
    spec(
        21,
        "policy_filters",
        Grammar::IpPairs {
            first: "address",
            second: "mask",
        },
    ),
    spec(22, "max_datagram_reassembly_size", Grammar::U16),
    spec(23, "default_ip_ttl", Grammar::U8),
    spec(24, "path_mtu_aging_timeout", Grammar::U32),
    spec(25, "path_mtu_aging_table", Grammar::U16List),
    spec(26, "interface_mtu", Grammar::U16),
    spec(27, "all_subnets_local", Grammar::Bool),
    spec(28, "broadcast_address", Grammar::Ip),
    spec(29, "perform_mask_discovery", Grammar::Bool),
    spec(30, "mask_supplier", Grammar::Bool),
    spec(31, "perform_router_discovery", Grammar::Bool),
    spec(32, "router_solicitation_address", Grammar::Ip),
    spec(
        33,
        "static_routes",
        Grammar::IpPairs {
            first: "destination",
            second: "router",
        },
    ),
    spec(34, "trailer_encapsulation", Grammar::Bool),
    spec(35, "arp_cache_timeout", Grammar::U32),
    spec(36, "ethernet_encapsulation", Grammar::Bool),
    spec(37, "tcp_default_ttl", Grammar::U8),
    spec(38, "tcp_keepalive_interval", Grammar::U32),
    spec(39, "tcp_keepalive_garbage", Grammar::Bool),
    spec(40, "network_information_service_domain", Grammar::Str),
    spec(41, "network_information_servers", Grammar::IpList),
    spec(42, "ntp_servers", Grammar::IpList),
    spec(43, "vendor_specific_information", Grammar::Hex),
    spec(44, "netbios_name_servers", Grammar::IpList),
    spec(45, "netbios_datagram_distribution_server", Grammar::IpList),
    spec(46, "netbios_node_type", Grammar::NetbiosNodeType),
    spec(47, "netbios_scope", Grammar::Str),
    spec(48, "x_window_system_font_servers", Grammar::IpList),
    spec(49, "x_window_system_display_manager", Grammar::IpList),
    spec(50, "requested_ip_address", Grammar::Ip),
    spec(51, "lease_time", Grammar::U32),
    spec(52, "option_overload", Grammar::Overload),
    spec(53, "dhcp_message_type", Grammar::MessageType),
    spec(54, "dhcp_server", Grammar::Ip),
    spec(55, "parameter_request_list", Grammar::U8List),
    spec(56, "message", Grammar::Str),
    spec(57, "max_dhcp_message_size", Grammar::U16),
    spec(58, "renewal_time", Grammar::U32),
    spec(59, "rebinding_time", Grammar::U32),
    spec(60, "vendor_class_identifier", Grammar::Str),
    spec(61, "client_identifier", Grammar::ClientIdentifier),
    spec(64, "nis_plus_domain", Grammar::Str),
    spec(65, "nis_plus_servers", Grammar::IpList),
    spec(66, "tftp_server_name", Grammar::Str),
    spec(67, "bootfile_name", Grammar::Str),
    spec(68, "mobile_ip_home_agent", Grammar::IpList),
    spec(69, "smtp_servers", Grammar::IpList),
    spec(70, "pop3_servers", Grammar::IpList),
    spec(71, "nntp_servers", Grammar::IpList),
    spec(72, "world_wide_web_servers", Grammar::IpList),
    spec(73, "finger_servers", Grammar::IpList),
    spec(74, "irc_servers", Grammar::IpList),
    spec(75, "streettalk_servers", Grammar::IpList),
    spec(76, "stda_servers", Grammar::IpList),
    spec(82, "relay_agent_info", Grammar::Str),
];

pub fn spec_by_code(code: u8) -> Option<&'static OptionSpec> {
    REGISTRY.iter().find(|entry| entry.code == code)
}

pub fn spec_by_key(key: &str) -> Option<&'static OptionSpec> {
    REGISTRY.iter().find(|entry| entry.key == key)
}

const NODE_TYPES: [(u8, &str); 4] = [
    (0x1, "B-node"),
    (0x2, "P-node"),
    (0x4, "M-node"),
    (0x8, "H-node"),
];

const OVERLOAD_MODES: [(u8, &str); 3] = [
    (1, "'file' field is used to hold options"),
    (2, "'sname' field is used to hold options"),
    (3, "both fields are used to hold options"),
];

fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("0x{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_hex_string(text: &str) -> Result<Vec<u8>> {
    text.split_whitespace()
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| Error::InvalidValue(format!("bad hex byte {token:?}")))
        })
        .collect()
}

fn data_to_ips(data: &[u8]) -> Option<Vec<Ipv4Addr>> {
    if data.len() % 4 != 0 {
        return None;
    }
    Some(
        data.chunks_exact(4)
            .map(|chunk| Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]))
            .collect(),
    )
}

/// A single DHCP option: a code and its raw payload. The payload's meaning
/// comes from the registry; unrecognized codes are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpOption {
    code: u8,
    data: Vec<u8>,
}

impl DhcpOption {
    pub fn new(code: u8, data: Vec<u8>) -> Self {
        Self { code, data }
    }

    pub fn pad() -> Self {
        Self::new(OPTION_PAD, Vec::new())
    }

    pub fn end() -> Self {
        Self::new(OPTION_END, Vec::new())
    }

    pub fn message_type(message_type: MessageType) -> Self {
        Self::new(53, vec![message_type as u8])
    }

    pub fn requested_ip_address(addr: Ipv4Addr) -> Self {
        Self::new(50, addr.octets().to_vec())
    }

    pub fn server_identifier(addr: Ipv4Addr) -> Self {
        Self::new(54, addr.octets().to_vec())
    }

    pub fn client_identifier(hwtype: u8, hwaddr: &[u8]) -> Self {
        let mut data = vec![hwtype];
        data.extend_from_slice(hwaddr);
        Self::new(61, data)
    }

    pub fn max_message_size(size: u16) -> Self {
        Self::new(57, size.to_be_bytes().to_vec())
    }

    pub fn parameter_request_list(codes: &[u8]) -> Self {
        Self::new(55, codes.to_vec())
    }

    pub fn hostname(name: &str) -> Self {
        Self::new(12, name.as_bytes().to_vec())
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn extend_data(&mut self, more: &[u8]) {
        self.data.extend_from_slice(more);
    }

    /// The canonical projection key for this option's code.
    pub fn key(&self) -> String {
        match self.code {
            OPTION_PAD => "pad_option".to_string(),
            OPTION_END => "end_option".to_string(),
            code => match spec_by_code(code) {
                Some(entry) => entry.key.to_string(),
                None => format!("unknown_{code}"),
            },
        }
    }

    /// Wire form including the code and length octets. PAD and END are a
    /// single code byte; payloads over 255 octets become consecutive
    /// same-code TLVs.
    pub fn as_bytes(&self) -> Vec<u8> {
        if self.code == OPTION_PAD || self.code == OPTION_END {
            return vec![self.code];
        }
        if self.data.is_empty() {
            return vec![self.code, 0];
        }
        let mut bytes = Vec::with_capacity(self.data.len() + 2);
        for chunk in self.data.chunks(MAX_TLV_DATA) {
            bytes.push(self.code);
            bytes.push(chunk.len() as u8);
            bytes.extend_from_slice(chunk);
        }
        bytes
    }

    pub fn as_message_type(&self) -> Option<MessageType> {
        if self.code != 53 || self.data.len() != 1 {
            return None;
        }
        MessageType::try_from(self.data[0]).ok()
    }

    pub fn as_ip(&self) -> Option<Ipv4Addr> {
        match self.data.as_slice() {
            [a, b, c, d] => Some(Ipv4Addr::new(*a, *b, *c, *d)),
            _ => None,
        }
    }

    pub fn as_ip_list(&self) -> Option<Vec<Ipv4Addr>> {
        data_to_ips(&self.data).filter(|ips| !ips.is_empty())
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self.data.as_slice() {
            [a, b, c, d] => Some(u32::from_be_bytes([*a, *b, *c, *d])),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(decode_text(&self.data))
    }

    /// Human-readable projection as a single-key JSON object.
    ///
    /// Total: a payload that does not fit the registered grammar projects
    /// as the hex-string form under the same key instead of failing.
    pub fn value(&self) -> Value {
        let key = self.key();
        if self.code == OPTION_PAD || self.code == OPTION_END {
            return json!({ key: "" });
        }
        let projected = match spec_by_code(self.code) {
            Some(entry) => project_data(entry.grammar, &self.data),
            None => None,
        };
        let inner = projected.unwrap_or_else(|| Value::String(hex_string(&self.data)));
        json!({ key: inner })
    }
}

fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

fn project_data(grammar: Grammar, data: &[u8]) -> Option<Value> {
    match grammar {
        Grammar::U8 => match data {
            [byte] => Some(json!(byte)),
            _ => None,
        },
        Grammar::U16 => match data {
            [a, b] => Some(json!(u16::from_be_bytes([*a, *b]))),
            _ => None,
        },
        Grammar::U32 => match data {
            [a, b, c, d] => Some(json!(u32::from_be_bytes([*a, *b, *c, *d]))),
            _ => None,
        },
        Grammar::I32 => match data {
            [a, b, c, d] => Some(json!(i32::from_be_bytes([*a, *b, *c, *d]))),
            _ => None,
        },
        Grammar::U8List => Some(json!(data)),
        Grammar::U16List => {
            if data.len() % 2 != 0 {
                return None;
            }
            let values: Vec<u16> = data
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            Some(json!(values))
        }
        Grammar::Bool => match data {
            [0] => Some(json!(false)),
            [1] => Some(json!(true)),
            _ => None,
        },
        Grammar::Ip => match data {
            [a, b, c, d] => Some(json!(Ipv4Addr::new(*a, *b, *c, *d).to_string())),
            _ => None,
        },
        Grammar::IpList => {
            let ips = data_to_ips(data)?;
            let strings: Vec<String> = ips.iter().map(Ipv4Addr::to_string).collect();
            Some(json!(strings))
        }
        Grammar::IpPairs { first, second } => {
            if data.len() % 8 != 0 {
                return None;
            }
            let pairs: Vec<Value> = data
                .chunks_exact(8)
                .map(|chunk| {
                    json!({
                        first: Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]).to_string(),
                        second: Ipv4Addr::new(chunk[4], chunk[5], chunk[6], chunk[7]).to_string(),
                    })
                })
                .collect();
            Some(json!(pairs))
        }
        Grammar::Str => Some(Value::String(decode_text(data))),
        Grammar::Hex => Some(Value::String(hex_string(data))),
        Grammar::MessageType => match data {
            [byte] => MessageType::try_from(*byte)
                .ok()
                .map(|message_type| Value::String(message_type.name().to_string())),
            _ => None,
        },
        Grammar::ClientIdentifier => match data {
            [hwtype, hwaddr @ ..] if !hwaddr.is_empty() => Some(json!({
                "hwtype": hwtype,
                "hwaddr": format_hwaddr(hwaddr),
            })),
            _ => None,
        },
        Grammar::NetbiosNodeType => match data {
            [byte] => NODE_TYPES
                .iter()
                .find(|(value, _)| value == byte)
                .map(|(_, name)| Value::String((*name).to_string())),
            _ => None,
        },
        Grammar::Overload => match data {
            [byte] => OVERLOAD_MODES
                .iter()
                .find(|(value, _)| value == byte)
                .map(|(_, name)| Value::String((*name).to_string())),
            _ => None,
        },
    }
}

fn encode_value(entry: &OptionSpec, value: &Value) -> Result<Vec<u8>> {
    let invalid = |detail: &str| Error::InvalidValue(format!("{}: {detail}", entry.key));
    match entry.grammar {
        Grammar::U8 => {
            let number = value
                .as_u64()
                .filter(|n| *n <= u8::MAX as u64)
                .ok_or_else(|| invalid("expected an integer 0-255"))?;
            Ok(vec![number as u8])
        }
        Grammar::U16 => {
            let number = value
                .as_u64()
                .filter(|n| *n <= u16::MAX as u64)
                .ok_or_else(|| invalid("expected an integer 0-65535"))?;
            Ok((number as u16).to_be_bytes().to_vec())
        }
        Grammar::U32 => {
            let number = value
                .as_u64()
                .filter(|n| *n <= u32::MAX as u64)
                .ok_or_else(|| invalid("expected a 32-bit unsigned integer"))?;
            Ok((number as u32).to_be_bytes().to_vec())
        }
        Grammar::I32 => {
            let number = value
                .as_i64()
                .filter(|n| i32::try_from(*n).is_ok())
                .ok_or_else(|| invalid("expected a 32-bit signed integer"))?;
            Ok((number as i32).to_be_bytes().to_vec())
        }
        Grammar::U8List => {
            let items = value.as_array().ok_or_else(|| invalid("expected a list"))?;
            items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .filter(|n| *n <= u8::MAX as u64)
                        .map(|n| n as u8)
                        .ok_or_else(|| invalid("expected integers 0-255"))
                })
                .collect()
        }
        Grammar::U16List => {
            let items = value.as_array().ok_or_else(|| invalid("expected a list"))?;
            let mut data = Vec::with_capacity(items.len() * 2);
            for item in items {
                let number = item
                    .as_u64()
                    .filter(|n| *n <= u16::MAX as u64)
                    .ok_or_else(|| invalid("expected integers 0-65535"))?;
                data.extend_from_slice(&(number as u16).to_be_bytes());
            }
            Ok(data)
        }
        Grammar::Bool => {
            let flag = value.as_bool().ok_or_else(|| invalid("expected a bool"))?;
            Ok(vec![flag as u8])
        }
        Grammar::Ip => {
            let addr = parse_ip(value).ok_or_else(|| invalid("expected an IPv4 address"))?;
            Ok(addr.octets().to_vec())
        }
        Grammar::IpList => {
            let items = value
                .as_array()
                .filter(|items| !items.is_empty())
                .ok_or_else(|| invalid("expected a non-empty list of IPv4 addresses"))?;
            let mut data = Vec::with_capacity(items.len() * 4);
            for item in items {
                let addr = parse_ip(item).ok_or_else(|| invalid("expected IPv4 addresses"))?;
                data.extend_from_slice(&addr.octets());
            }
            Ok(data)
        }
        Grammar::IpPairs { first, second } => {
            let items = value
                .as_array()
                .filter(|items| !items.is_empty())
                .ok_or_else(|| invalid("expected a non-empty list of address pairs"))?;
            let mut data = Vec::with_capacity(items.len() * 8);
            for item in items {
                for half in [first, second] {
                    let addr = item
                        .get(half)
                        .and_then(parse_ip)
                        .ok_or_else(|| invalid(&format!("pair missing IPv4 {half:?}")))?;
                    data.extend_from_slice(&addr.octets());
                }
            }
            Ok(data)
        }
        Grammar::Str => {
            let text = value.as_str().ok_or_else(|| invalid("expected a string"))?;
            if text.contains('\0') {
                return Err(invalid("NUL is not allowed"));
            }
            Ok(text.as_bytes().to_vec())
        }
        Grammar::Hex => {
            let text = value
                .as_str()
                .ok_or_else(|| invalid("expected a hex byte string like \"0x0B 0x1C\""))?;
            parse_hex_string(text)
        }
        Grammar::MessageType => {
            let name = value
                .as_str()
                .and_then(MessageType::from_name)
                .ok_or_else(|| invalid("expected a DHCP message type name"))?;
            Ok(vec![name as u8])
        }
        Grammar::ClientIdentifier => {
            let hwtype = value
                .get("hwtype")
                .and_then(Value::as_u64)
                .filter(|n| *n <= u8::MAX as u64)
                .ok_or_else(|| invalid("expected {\"hwtype\": int, \"hwaddr\": str}"))?;
            let hwaddr = value
                .get("hwaddr")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("expected {\"hwtype\": int, \"hwaddr\": str}"))?;
            let hwaddr_bytes = parse_hwaddr(hwaddr)
                .map_err(|_| invalid("hwaddr must be colon-delimited hex"))?;
            let mut data = vec![hwtype as u8];
            data.extend_from_slice(&hwaddr_bytes);
            Ok(data)
        }
        Grammar::NetbiosNodeType => {
            let name = value.as_str().ok_or_else(|| invalid("expected a node type"))?;
            NODE_TYPES
                .iter()
                .find(|(_, candidate)| *candidate == name)
                .map(|(byte, _)| vec![*byte])
                .ok_or_else(|| invalid("expected B-node, P-node, M-node or H-node"))
        }
        Grammar::Overload => {
            let name = value.as_str().ok_or_else(|| invalid("expected an overload mode"))?;
            OVERLOAD_MODES
                .iter()
                .find(|(_, candidate)| *candidate == name)
                .map(|(byte, _)| vec![*byte])
                .ok_or_else(|| invalid("unrecognized overload mode"))
        }
    }
}

fn parse_ip(value: &Value) -> Option<Ipv4Addr> {
    value.as_str().and_then(|text| text.parse().ok())
}

/// Reads one option starting at `offset`, returning it and the offset of
/// the next option. PAD and END consume a single byte.
pub fn decode_one(buf: &[u8], offset: usize) -> Result<(DhcpOption, usize)> {
    let code = *buf.get(offset).ok_or_else(|| {
        Error::MalformedPacket(format!("option read past end of buffer at {offset}"))
    })?;
    if code == OPTION_PAD || code == OPTION_END {
        return Ok((DhcpOption::new(code, Vec::new()), offset + 1));
    }
    let declared = match buf.get(offset + 1) {
        Some(length) => *length as usize,
        None => {
            return Err(Error::TruncatedOption {
                code,
                declared: 1,
                available: 0,
            });
        }
    };
    let start = offset + 2;
    let available = buf.len().saturating_sub(start);
    if declared > available {
        return Err(Error::TruncatedOption {
            code,
            declared,
            available,
        });
    }
    let data = buf[start..start + declared].to_vec();
    Ok((DhcpOption::new(code, data), start + declared))
}

/// Decodes a single option from the start of `bytes`.
pub fn bytes_to_object(bytes: &[u8]) -> Result<DhcpOption> {
    decode_one(bytes, 0).map(|(option, _)| option)
}

/// Builds an option from its single-key JSON projection.
pub fn value_to_object(value: &Value) -> Result<DhcpOption> {
    let (key, inner) = value
        .as_object()
        .filter(|map| map.len() == 1)
        .and_then(|map| map.iter().next())
        .ok_or_else(|| Error::InvalidValue("expected a single-key object".to_string()))?;
    match key.as_str() {
        "pad_option" => return Ok(DhcpOption::pad()),
        "end_option" => return Ok(DhcpOption::end()),
        _ => {}
    }
    if let Some(entry) = spec_by_key(key) {
        let data = encode_value(entry, inner)?;
        return Ok(DhcpOption::new(entry.code, data));
    }
    if let Some(code_text) = key.strip_prefix("unknown_")
        && let Ok(code) = code_text.parse::<u8>()
    {
        let text = inner
            .as_str()
            .ok_or_else(|| Error::InvalidValue(format!("{key}: expected a hex byte string")))?;
        return Ok(DhcpOption::new(code, parse_hex_string(text)?));
    }
    Err(Error::UnknownOption(key.clone()))
}

/// Builds an option from its code and the bare (unwrapped) value.
pub fn short_value_to_object(code: u8, short_value: Value) -> Result<DhcpOption> {
    let key = match code {
        OPTION_PAD => "pad_option".to_string(),
        OPTION_END => "end_option".to_string(),
        code => match spec_by_code(code) {
            Some(entry) => entry.key.to_string(),
            None => format!("unknown_{code}"),
        },
    };
    value_to_object(&json!({ key: short_value }))
}

/// Composes [`value_to_object`] with wire encoding.
pub fn value_to_bytes(value: &Value) -> Result<Vec<u8>> {
    value_to_object(value).map(|option| option.as_bytes())
}

/// Ordered option container with at most one entry per code.
///
/// Appending a duplicate code replaces the existing entry in its current
/// slot; iteration yields insertion order.
#[derive(Debug, Clone, Default)]
pub struct OptionList {
    entries: Vec<DhcpOption>,
    index: HashMap<u8, usize>,
}

impl OptionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options<I: IntoIterator<Item = DhcpOption>>(options: I) -> Self {
        let mut list = Self::new();
        for option in options {
            list.append(option);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&DhcpOption> {
        self.entries.get(position)
    }

    pub fn by_code(&self, code: u8) -> Option<&DhcpOption> {
        self.index.get(&code).map(|position| &self.entries[*position])
    }

    pub fn contains_code(&self, code: u8) -> bool {
        self.index.contains_key(&code)
    }

    /// Appends, or replaces in place when the code is already present.
    pub fn append(&mut self, option: DhcpOption) {
        match self.index.get(&option.code()) {
            Some(position) => self.entries[*position] = option,
            None => {
                self.index.insert(option.code(), self.entries.len());
                self.entries.push(option);
            }
        }
    }

    /// Appends, failing instead of replacing on a duplicate code.
    pub fn append_strict(&mut self, option: DhcpOption) -> Result<()> {
        if self.contains_code(option.code()) {
            return Err(Error::DuplicateOptionCode(option.code()));
        }
        self.append(option);
        Ok(())
    }

    /// Inserts at `position`, evicting any existing entry with the same
    /// code first.
    pub fn insert(&mut self, position: usize, option: DhcpOption) {
        if let Some(existing) = self.index.get(&option.code()).copied() {
            self.entries.remove(existing);
        }
        let position = position.min(self.entries.len());
        self.entries.insert(position, option);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, option)| (option.code(), position))
            .collect();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DhcpOption> {
        self.entries.iter()
    }

    /// Merged projection of every entry, keyed by option name.
    pub fn as_json(&self) -> Value {
        let mut merged = serde_json::Map::new();
        for option in &self.entries {
            if let Value::Object(map) = option.value() {
                merged.extend(map);
            }
        }
        Value::Object(merged)
    }
}

impl PartialEq for OptionList {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for OptionList {}

impl<'a> IntoIterator for &'a OptionList {
    type Item = &'a DhcpOption;
    type IntoIter = std::slice::Iter<'a, DhcpOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<DhcpOption> for OptionList {
    fn from_iter<I: IntoIterator<Item = DhcpOption>>(iter: I) -> Self {
        Self::from_options(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_bytes() {
        let option = short_value_to_object(53, json!("DHCPDISCOVER")).unwrap();
        assert_eq!(option.as_bytes(), vec![0x35, 0x01, 0x01]);
        assert_eq!(option.value(), json!({"dhcp_message_type": "DHCPDISCOVER"}));
    }

    #[test]
    fn test_client_identifier_bytes() {
        let value = json!({"client_identifier": {"hwtype": 1, "hwaddr": "8C:45:00:45:12:09"}});
        assert_eq!(
            value_to_bytes(&value).unwrap(),
            vec![0x3d, 0x07, 0x01, 0x8c, 0x45, 0x00, 0x45, 0x12, 0x09]
        );
        let option = value_to_object(&value).unwrap();
        assert_eq!(option.value(), value);
    }

    #[test]
    fn test_subnet_mask_roundtrip() {
        let option = bytes_to_object(&[0x01, 0x04, 0xff, 0xff, 0xff, 0x00]).unwrap();
        assert_eq!(option.value(), json!({"subnet_mask": "255.255.255.0"}));
        assert_eq!(
            value_to_object(&option.value()).unwrap().as_bytes(),
            vec![0x01, 0x04, 0xff, 0xff, 0xff, 0x00]
        );
    }

    #[test]
    fn test_ip_list_roundtrip() {
        let value = json!({"dns_servers": ["8.8.8.8", "1.1.1.1"]});
        let option = value_to_object(&value).unwrap();
        assert_eq!(option.code(), 6);
        assert_eq!(option.length(), 8);
        assert_eq!(option.value(), value);
    }

    #[test]
    fn test_uint_grammars() {
        assert_eq!(
            value_to_bytes(&json!({"default_ip_ttl": 123})).unwrap(),
            vec![0x17, 0x01, 0x7b]
        );
        assert_eq!(
            value_to_bytes(&json!({"max_dhcp_message_size": 1500})).unwrap(),
            vec![0x39, 0x02, 0x05, 0xdc]
        );
        assert_eq!(
            value_to_bytes(&json!({"lease_time": 86400})).unwrap(),
            vec![0x33, 0x04, 0x00, 0x01, 0x51, 0x80]
        );
        assert_eq!(
            value_to_bytes(&json!({"time_offset_s": -3600})).unwrap(),
            vec![0x02, 0x04, 0xff, 0xff, 0xf1, 0xf0]
        );
    }

    #[test]
    fn test_bool_grammar() {
        assert_eq!(
            value_to_bytes(&json!({"ip_forwarding": true})).unwrap(),
            vec![0x13, 0x01, 0x01]
        );
        let option = bytes_to_object(&[0x13, 0x01, 0x00]).unwrap();
        assert_eq!(option.value(), json!({"ip_forwarding": false}));
    }

    #[test]
    fn test_parameter_request_list() {
        let value = json!({"parameter_request_list": [1, 3, 6, 15, 26, 28, 51, 58, 59, 43]});
        let option = value_to_object(&value).unwrap();
        assert_eq!(
            option.as_bytes(),
            vec![0x37, 0x0a, 1, 3, 6, 15, 26, 28, 51, 58, 59, 43]
        );
        assert_eq!(option.value(), value);
    }

    #[test]
    fn test_u16_list_grammar() {
        let value = json!({"path_mtu_aging_table": [12349, 23459, 34569, 45679]});
        let option = value_to_object(&value).unwrap();
        assert_eq!(
            option.data(),
            &[0x30, 0x3d, 0x5b, 0xa3, 0x87, 0x09, 0xb2, 0x6f]
        );
        assert_eq!(option.value(), value);
    }

    #[test]
    fn test_static_routes_pairs() {
        let value = json!({"static_routes": [
            {"destination": "1.1.1.1", "router": "255.255.255.0"},
            {"destination": "192.168.56.2", "router": "255.255.255.0"},
        ]});
        let option = value_to_object(&value).unwrap();
        assert_eq!(option.code(), 33);
        assert_eq!(option.length(), 16);
        assert_eq!(option.value(), value);
    }

    #[test]
    fn test_policy_filter_pairs() {
        let value = json!({"policy_filters": [{"address": "1.1.1.1", "mask": "255.255.255.0"}]});
        let option = value_to_object(&value).unwrap();
        assert_eq!(
            option.as_bytes(),
            vec![0x15, 0x08, 1, 1, 1, 1, 255, 255, 255, 0]
        );
    }

    #[test]
    fn test_hex_grammar() {
        let value = json!({"vendor_specific_information": "0x0B 0x1C 0x01 0x02"});
        let option = value_to_object(&value).unwrap();
        assert_eq!(option.as_bytes(), vec![0x2b, 0x04, 0x0b, 0x1c, 0x01, 0x02]);
        assert_eq!(option.value(), value);
    }

    #[test]
    fn test_netbios_node_type() {
        let option = value_to_object(&json!({"netbios_node_type": "B-node"})).unwrap();
        assert_eq!(option.as_bytes(), vec![0x2e, 0x01, 0x01]);
        assert_eq!(option.value(), json!({"netbios_node_type": "B-node"}));
    }

    #[test]
    fn test_overload_grammar() {
        let sentence = "'file' field is used to hold options";
        let option = value_to_object(&json!({"option_overload": sentence})).unwrap();
        assert_eq!(option.as_bytes(), vec![0x34, 0x01, 0x01]);
        assert_eq!(option.value(), json!({"option_overload": sentence}));
    }

    #[test]
    fn test_unknown_option_preserved() {
        let option = bytes_to_object(&[0xfa, 0x04, 0x0a, 0x12, 0xde, 0xca]).unwrap();
        assert_eq!(option.value(), json!({"unknown_250": "0x0A 0x12 0xDE 0xCA"}));
        assert_eq!(
            value_to_object(&option.value()).unwrap().as_bytes(),
            vec![0xfa, 0x04, 0x0a, 0x12, 0xde, 0xca]
        );
    }

    #[test]
    fn test_pad_and_end() {
        assert_eq!(bytes_to_object(&[0x00]).unwrap(), DhcpOption::pad());
        assert_eq!(bytes_to_object(&[0xff]).unwrap(), DhcpOption::end());
        assert_eq!(value_to_bytes(&json!({"pad_option": ""})).unwrap(), vec![0x00]);
        assert_eq!(value_to_bytes(&json!({"end_option": ""})).unwrap(), vec![0xff]);
        assert_eq!(DhcpOption::pad().value(), json!({"pad_option": ""}));
    }

    #[test]
    fn test_truncated_option() {
        let result = bytes_to_object(&[0x0c, 0x09, b'G', b'a']);
        assert!(matches!(
            result,
            Err(Error::TruncatedOption {
                code: 12,
                declared: 9,
                available: 2,
            })
        ));
        assert!(matches!(
            bytes_to_object(&[0x0c]),
            Err(Error::TruncatedOption { code: 12, .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            value_to_object(&json!({"subnet_mask": "not-an-ip"})),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            value_to_object(&json!({"default_ip_ttl": 300})),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            value_to_object(&json!({"routers": []})),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            value_to_object(&json!({"dhcp_message_type": "DHCPBOGUS"})),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            value_to_object(&json!({"hostname": "a\0b"})),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            value_to_object(&json!({"no_such_option": 1})),
            Err(Error::UnknownOption(_))
        ));
    }

    #[test]
    fn test_long_option_split_on_encode() {
        let data: Vec<u8> = (0..300).map(|n| (n % 256) as u8).collect();
        let option = DhcpOption::new(43, data.clone());
        let bytes = option.as_bytes();
        assert_eq!(bytes[0], 43);
        assert_eq!(bytes[1], 255);
        assert_eq!(bytes[2 + 255], 43);
        assert_eq!(bytes[2 + 255 + 1], 45);
        assert_eq!(bytes.len(), 2 + 255 + 2 + 45);

        let (first, next) = decode_one(&bytes, 0).unwrap();
        let (second, _) = decode_one(&bytes, next).unwrap();
        let mut merged = first.data().to_vec();
        merged.extend_from_slice(second.data());
        assert_eq!(merged, data);
    }

    #[test]
    fn test_projection_total_on_bad_payload() {
        // Three bytes cannot be a subnet mask; projection degrades to hex.
        let option = DhcpOption::new(1, vec![1, 2, 3]);
        assert_eq!(option.value(), json!({"subnet_mask": "0x01 0x02 0x03"}));
    }

    #[test]
    fn test_registry_is_code_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in REGISTRY {
            assert!(seen.insert(entry.code), "duplicate code {}", entry.code);
            assert!(entry.code != OPTION_PAD && entry.code != OPTION_END);
        }
    }

    #[test]
    fn test_option_list_dedup() {
        let mut list = OptionList::new();
        list.append(short_value_to_object(57, json!(1500)).unwrap());
        list.append(short_value_to_object(12, json!("host-a")).unwrap());
        list.append(short_value_to_object(57, json!(5000)).unwrap());

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().code(), 57);
        assert_eq!(
            list.by_code(57).unwrap().value(),
            json!({"max_dhcp_message_size": 5000})
        );
    }

    #[test]
    fn test_option_list_strict_append() {
        let mut list = OptionList::new();
        list.append(DhcpOption::max_message_size(1500));
        let result = list.append_strict(DhcpOption::max_message_size(5000));
        assert!(matches!(result, Err(Error::DuplicateOptionCode(57))));
        assert_eq!(
            list.by_code(57).unwrap().value(),
            json!({"max_dhcp_message_size": 1500})
        );
    }

    #[test]
    fn test_option_list_insert_front() {
        let mut list = OptionList::from_options([
            DhcpOption::hostname("host-a"),
            DhcpOption::max_message_size(1500),
        ]);
        list.insert(0, DhcpOption::message_type(MessageType::Discover));
        assert_eq!(list.get(0).unwrap().code(), 53);
        assert_eq!(list.get(1).unwrap().code(), 12);
        assert_eq!(list.len(), 3);

        // Inserting an existing code evicts the old slot first.
        list.insert(0, DhcpOption::max_message_size(2000));
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0).unwrap().code(), 57);
        assert_eq!(
            list.by_code(57).unwrap().value(),
            json!({"max_dhcp_message_size": 2000})
        );
    }

    #[test]
    fn test_option_list_by_code_absent() {
        let list = OptionList::new();
        assert!(list.by_code(54).is_none());
        assert!(!list.contains_code(54));
    }

    #[test]
    fn test_option_list_as_json() {
        let list = OptionList::from_options([
            DhcpOption::message_type(MessageType::Offer),
            DhcpOption::server_identifier(Ipv4Addr::new(192, 168, 56, 2)),
        ]);
        assert_eq!(
            list.as_json(),
            json!({
                "dhcp_message_type": "DHCPOFFER",
                "dhcp_server": "192.168.56.2",
            })
        );
    }

    #[test]
    fn test_typed_accessors() {
        let option = DhcpOption::server_identifier(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(option.as_ip(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(
            DhcpOption::message_type(MessageType::Nak).as_message_type(),
            Some(MessageType::Nak)
        );
        assert_eq!(
            DhcpOption::new(51, vec![0, 0, 0x0e, 0x10]).as_u32(),
            Some(3600)
        );
        assert_eq!(
            DhcpOption::hostname("Galaxy-S9").as_string().as_deref(),
            Some("Galaxy-S9")
        );
    }
}

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Six-octet Ethernet hardware address.
///
/// Parses from colon- or dash-delimited hex and displays as uppercase
/// colon-delimited hex, the canonical form used throughout the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Draws a random MAC address, for probing without a real NIC identity.
    pub fn random() -> Self {
        use rand::Rng;
        let mut octets = [0u8; 6];
        rand::thread_rng().fill(&mut octets);
        Self(octets)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() < 6 {
            return Err(Error::InvalidMacAddr(format!(
                "need 6 octets, got {}",
                slice.len()
            )));
        }
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&slice[..6]);
        Ok(Self(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// The 16-octet `chaddr` field form: left-justified, zero-padded.
    pub fn as_chaddr(&self) -> [u8; 16] {
        let mut chaddr = [0u8; 16];
        chaddr[..6].copy_from_slice(&self.0);
        chaddr
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('-', ":");
        let parts: Vec<&str> = normalized.split(':').collect();
        if parts.len() != 6 {
            return Err(Error::InvalidMacAddr(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (index, part) in parts.iter().enumerate() {
            octets[index] = u8::from_str_radix(part, 16)
                .map_err(|_| Error::InvalidMacAddr(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

/// Renders arbitrary hardware address bytes as uppercase colon hex.
///
/// Used for `chaddr` (first `hlen` octets) and ClientIdentifier payloads,
/// which are not always six octets long.
pub fn format_hwaddr(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parses colon- or dash-delimited hex of any length into bytes.
pub fn parse_hwaddr(s: &str) -> Result<Vec<u8>> {
    let normalized = s.replace('-', ":");
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.is_empty() || parts.iter().any(|part| part.is_empty()) {
        return Err(Error::InvalidMacAddr(s.to_string()));
    }
    parts
        .iter()
        .map(|part| {
            u8::from_str_radix(part, 16).map_err(|_| Error::InvalidMacAddr(s.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colon_delimited() {
        let mac: MacAddr = "8c:45:00:45:12:09".parse().unwrap();
        assert_eq!(mac.octets(), [0x8c, 0x45, 0x00, 0x45, 0x12, 0x09]);
    }

    #[test]
    fn test_parse_dash_delimited() {
        let mac: MacAddr = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn test_display_uppercase() {
        let mac = MacAddr::new([0x8c, 0x45, 0x00, 0x45, 0x12, 0x09]);
        assert_eq!(mac.to_string(), "8C:45:00:45:12:09");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("invalid".parse::<MacAddr>().is_err());
        assert!("".parse::<MacAddr>().is_err());
        assert!("aa:bb:cc:dd:ee".parse::<MacAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:gg".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_chaddr_padding() {
        let mac = MacAddr::new([1, 2, 3, 4, 5, 6]);
        let chaddr = mac.as_chaddr();
        assert_eq!(&chaddr[..6], &[1, 2, 3, 4, 5, 6]);
        assert!(chaddr[6..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn test_random_roundtrip() {
        let mac = MacAddr::random();
        let reparsed: MacAddr = mac.to_string().parse().unwrap();
        assert_eq!(mac, reparsed);
    }

    #[test]
    fn test_hwaddr_helpers() {
        assert_eq!(format_hwaddr(&[0x01, 0x8c, 0x45]), "01:8C:45");
        assert_eq!(parse_hwaddr("01:8C:45").unwrap(), vec![0x01, 0x8c, 0x45]);
        assert!(parse_hwaddr("01::45").is_err());
    }
}

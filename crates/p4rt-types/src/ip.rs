//! IPv4 address and prefix types with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 address in dotted-decimal form.
///
/// Parsing is strict: exactly four decimal octets in `0..=255`, no leading
/// zeros, no surrounding whitespace. The octets are what a P4Runtime LPM
/// match carries on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv4Address(Ipv4Addr);

impl Ipv4Address {
    pub const UNSPECIFIED: Self = Ipv4Address(Ipv4Addr::UNSPECIFIED);
    pub const LOCALHOST: Self = Ipv4Address(Ipv4Addr::LOCALHOST);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(Ipv4Addr::new(a, b, c, d))
    }

    pub const fn inner(&self) -> Ipv4Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    /// Returns the address as the 4-byte big-endian bytestring used in
    /// P4Runtime field matches.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.octets().to_vec()
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv4Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Ipv4Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(addr)
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        addr.0
    }
}

/// An IPv4 prefix in CIDR notation (e.g., 10.0.0.0/24).
///
/// The address bits beyond the prefix length are kept as given; the device
/// decides whether it accepts non-canonical LPM values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Prefix {
    address: Ipv4Address,
    prefix_len: u8,
}

impl Ipv4Prefix {
    /// Longest valid prefix length for IPv4.
    pub const MAX_LEN: u8 = 32;

    /// Creates a new IPv4 prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 32.
    pub fn new(address: Ipv4Address, prefix_len: u32) -> Result<Self, ParseError> {
        if prefix_len > u32::from(Self::MAX_LEN) {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {}",
                prefix_len,
                Self::MAX_LEN
            )));
        }

        Ok(Ipv4Prefix {
            address,
            prefix_len: prefix_len as u8,
        })
    }

    /// Creates a /32 host prefix.
    pub const fn host(address: Ipv4Address) -> Self {
        Ipv4Prefix {
            address,
            prefix_len: Self::MAX_LEN,
        }
    }

    /// Returns the address part of this prefix.
    pub const fn address(&self) -> &Ipv4Address {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns true if this is the default route (0.0.0.0/0).
    pub const fn is_default(&self) -> bool {
        self.prefix_len == 0
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = ParseError;

    /// Parses `a.b.c.d/len`. A bare address is read as a host route.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((addr_str, len_str)) = s.rsplit_once('/') else {
            return s.parse::<Ipv4Address>().map(Ipv4Prefix::host);
        };

        let address: Ipv4Address = addr_str.parse()?;
        let prefix_len: u32 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        Ipv4Prefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for Ipv4Prefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Prefix> for String {
    fn from(prefix: Ipv4Prefix) -> String {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ipv4_parse_octets() {
        let addr: Ipv4Address = "192.168.1.1".parse().unwrap();
        assert_eq!(addr.octets(), [192, 168, 1, 1]);
        assert_eq!(addr.to_bytes(), vec![192, 168, 1, 1]);
    }

    #[test]
    fn test_ipv4_round_trip_text() {
        for text in ["0.0.0.0", "10.0.0.1", "10.0.0.2", "255.255.255.255", "172.16.254.3"] {
            let addr: Ipv4Address = text.parse().unwrap();
            assert_eq!(addr.to_bytes().len(), 4);
            assert_eq!(addr.to_string(), text);
        }
    }

    #[test]
    fn test_ipv4_rejects_malformed() {
        for text in [
            "",
            "10.0.0",
            "10.0.0.1.5",
            "256.0.0.1",
            "10.0.0.-1",
            "a.b.c.d",
            " 10.0.0.1",
            "2001:db8::1",
        ] {
            let err = text.parse::<Ipv4Address>().unwrap_err();
            assert_eq!(err, ParseError::InvalidIpAddress(text.to_string()));
        }
    }

    #[test]
    fn test_prefix_parse() {
        let prefix: Ipv4Prefix = "10.0.0.0/24".parse().unwrap();
        assert_eq!(prefix.address().octets(), [10, 0, 0, 0]);
        assert_eq!(prefix.prefix_len(), 24);
    }

    #[test]
    fn test_prefix_bare_address_is_host_route() {
        let prefix: Ipv4Prefix = "10.0.0.1".parse().unwrap();
        assert_eq!(prefix.prefix_len(), Ipv4Prefix::MAX_LEN);
        assert_eq!(prefix.to_string(), "10.0.0.1/32");
    }

    #[test]
    fn test_prefix_default_route() {
        let prefix: Ipv4Prefix = "0.0.0.0/0".parse().unwrap();
        assert!(prefix.is_default());
    }

    #[test]
    fn test_invalid_prefix_length() {
        assert!("10.0.0.0/33".parse::<Ipv4Prefix>().is_err());
        assert!("10.0.0.0/abc".parse::<Ipv4Prefix>().is_err());
        assert!(Ipv4Prefix::new(Ipv4Address::LOCALHOST, 33).is_err());
        assert!(Ipv4Prefix::new(Ipv4Address::LOCALHOST, 32).is_ok());
    }

    #[test]
    fn test_prefix_string_conversions() {
        let prefix = Ipv4Prefix::try_from("10.0.0.2/32".to_string()).unwrap();
        assert_eq!(prefix.address().octets(), [10, 0, 0, 2]);
        assert_eq!(String::from(prefix), "10.0.0.2/32");
    }
}

//! Egress port number carried as an action parameter.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device port number bound to a forwarding action.
///
/// The action parameter is a fixed 2-byte big-endian bytestring, so the
/// value must fit in 16 bits. Wider values are rejected instead of being
/// truncated.
///
/// # Examples
///
/// ```
/// use p4rt_types::PortNumber;
///
/// let port = PortNumber::new(1).unwrap();
/// assert_eq!(port.to_be_bytes(), [0, 1]);
///
/// assert!(PortNumber::new(65_536).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct PortNumber(u16);

impl PortNumber {
    /// Encoded width of the action parameter.
    pub const WIDTH_BYTES: usize = 2;

    /// Creates a port number.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::PortOutOfRange`] if the value does not fit in
    /// [`Self::WIDTH_BYTES`] bytes.
    pub fn new(port: u64) -> Result<Self, ParseError> {
        u16::try_from(port)
            .map(PortNumber)
            .map_err(|_| ParseError::PortOutOfRange(port))
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Big-endian fixed-width encoding.
    pub const fn to_be_bytes(&self) -> [u8; Self::WIDTH_BYTES] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PortNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidPortNumber(s.to_string()))?;
        PortNumber::new(value)
    }
}

impl TryFrom<u64> for PortNumber {
    type Error = ParseError;

    fn try_from(port: u64) -> Result<Self, Self::Error> {
        PortNumber::new(port)
    }
}

impl From<u16> for PortNumber {
    fn from(port: u16) -> Self {
        PortNumber(port)
    }
}

impl From<PortNumber> for u64 {
    fn from(port: PortNumber) -> u64 {
        u64::from(port.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encoding_is_big_endian() {
        assert_eq!(PortNumber::new(0).unwrap().to_be_bytes(), [0x00, 0x00]);
        assert_eq!(PortNumber::new(1).unwrap().to_be_bytes(), [0x00, 0x01]);
        assert_eq!(PortNumber::new(0x1234).unwrap().to_be_bytes(), [0x12, 0x34]);
        assert_eq!(PortNumber::new(65_535).unwrap().to_be_bytes(), [0xff, 0xff]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(
            PortNumber::new(65_536).unwrap_err(),
            ParseError::PortOutOfRange(65_536)
        );
        assert!(PortNumber::new(u64::MAX).is_err());
    }

    #[test]
    fn test_parse() {
        let port: PortNumber = "7".parse().unwrap();
        assert_eq!(port.as_u16(), 7);
        assert!("seven".parse::<PortNumber>().is_err());
        assert!("70000".parse::<PortNumber>().is_err());
    }

    #[test]
    fn test_error_display() {
        let err = PortNumber::new(70_000).unwrap_err();
        assert_eq!(err.to_string(), "port 70000 does not fit in 16 bits");
    }
}

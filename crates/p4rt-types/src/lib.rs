//! Common types for a P4Runtime control plane.
//!
//! This crate provides type-safe representations of the values a controller
//! exchanges with a P4Runtime device:
//!
//! - [`ElectionId`]: 128-bit mastership election identifier
//! - [`DeviceId`]: P4Runtime device identifier
//! - [`Ipv4Address`]: dotted-decimal IPv4 addresses
//! - [`Ipv4Prefix`]: IPv4 prefixes (CIDR notation) used as LPM keys
//! - [`PortNumber`]: egress port encoded as a fixed-width action parameter

mod election;
mod ip;
mod port;

pub use election::{DeviceId, ElectionId};
pub use ip::{Ipv4Address, Ipv4Prefix};
pub use port::PortNumber;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IPv4 address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IPv4 prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("port {0} does not fit in {bits} bits", bits = PortNumber::WIDTH_BYTES * 8)]
    PortOutOfRange(u64),

    #[error("invalid port number: {0}")]
    InvalidPortNumber(String),
}

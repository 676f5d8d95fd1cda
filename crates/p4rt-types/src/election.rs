//! Device and election identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// P4Runtime device identifier.
///
/// Identifies one forwarding device behind a P4Runtime server. Most targets
/// (BMv2 `simple_switch_grpc` included) expose a single device with id 0.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(u64);

impl DeviceId {
    pub const fn new(id: u64) -> Self {
        DeviceId(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        DeviceId(id)
    }
}

/// 128-bit mastership election identifier.
///
/// Stored as the high/low 64-bit halves carried by the P4Runtime `Uint128`
/// message. Field order makes the derived ordering numeric, which is how
/// devices rank competing controllers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ElectionId {
    high: u64,
    low: u64,
}

impl ElectionId {
    pub const fn new(high: u64, low: u64) -> Self {
        ElectionId { high, low }
    }

    /// Builds an election id from its low word, with an implicit zero high
    /// word.
    pub const fn from_low(low: u64) -> Self {
        ElectionId { high: 0, low }
    }

    pub const fn high(&self) -> u64 {
        self.high
    }

    pub const fn low(&self) -> u64 {
        self.low
    }

    pub const fn as_u128(&self) -> u128 {
        ((self.high as u128) << 64) | self.low as u128
    }
}

impl From<u128> for ElectionId {
    fn from(value: u128) -> Self {
        ElectionId {
            high: (value >> 64) as u64,
            low: value as u64,
        }
    }
}

impl From<ElectionId> for u128 {
    fn from(id: ElectionId) -> u128 {
        id.as_u128()
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u128())
    }
}

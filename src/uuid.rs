//! Service identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReeSessionError;

/// Size of a UUID in its binary form.
pub const UUID_LEN: usize = 16;

/// A 16-byte identifier naming a trusted application or REE service.
///
/// The binary form passed to the proxy follows the TEE convention: the
/// three leading fields little-endian, then the eight clock/node bytes.
/// Text and serde use the canonical hyphenated form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeeUuid(Uuid);

impl TeeUuid {
    /// The all-zero identifier.
    pub const NIL: Self = Self(Uuid::nil());

    pub const fn new(
        time_low: u32,
        time_mid: u16,
        time_hi_and_version: u16,
        clock_seq_and_node: [u8; 8],
    ) -> Self {
        Self(Uuid::from_fields(
            time_low,
            time_mid,
            time_hi_and_version,
            &clock_seq_and_node,
        ))
    }

    pub fn time_low(&self) -> u32 {
        self.0.as_fields().0
    }

    pub fn time_mid(&self) -> u16 {
        self.0.as_fields().1
    }

    pub fn time_hi_and_version(&self) -> u16 {
        self.0.as_fields().2
    }

    pub fn clock_seq_and_node(&self) -> [u8; 8] {
        *self.0.as_fields().3
    }

    /// Binary form as handed to the proxy.
    pub fn to_bytes(&self) -> [u8; UUID_LEN] {
        self.0.to_bytes_le()
    }

    /// Parse the binary form. Returns `None` unless exactly 16 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; UUID_LEN] = bytes.try_into().ok()?;
        Some(Self(Uuid::from_bytes_le(bytes)))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for TeeUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for TeeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for TeeUuid {
    type Err = ReeSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ReeSessionError::InvalidUuid(s.into()))
    }
}

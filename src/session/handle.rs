//! Opaque service handle type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque handle naming one resolved REE service.
///
/// The value is issued by the proxy and only meaningful to the proxy and
/// the service behind it. It travels as two 32-bit value words: `a` holds
/// the low half and `b` the high half. Displayed as `ree-XXXXXXXXXXXXXXXX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceHandle(u64);

impl ServiceHandle {
    /// Create a handle from a raw u64 value.
    ///
    /// This is primarily for proxies issuing handles and for testing.
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw u64 value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Rebuild a handle from the value words of a parameter slot.
    pub const fn from_words(a: u32, b: u32) -> Self {
        Self(((b as u64) << 32) | a as u64)
    }

    /// Split into `(a, b)` value words.
    pub const fn to_words(&self) -> (u32, u32) {
        (self.0 as u32, (self.0 >> 32) as u32)
    }
}

impl fmt::Display for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ree-{:016x}", self.0)
    }
}

impl FromStr for ServiceHandle {
    type Err = crate::error::ReeSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("ree-")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(ServiceHandle)
            .ok_or_else(|| crate::error::ReeSessionError::BadParameters(s.into()))
    }
}

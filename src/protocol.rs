//! Commands and constants understood by the generic proxy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::uuid::TeeUuid;

/// Well-known identifier of the generic proxy.
pub const GENERIC_PROXY_UUID: TeeUuid = TeeUuid::new(
    0x9cc8_6a4e,
    0x2a33,
    0x4d22,
    [0x8b, 0x3a, 0x20, 0x3e, 0x9b, 0x6b, 0x1a, 0x52],
);

/// First command id reserved for the proxy itself.
///
/// Ids at or above this value are handled by the proxy; every other id
/// belongs to the REE service and is forwarded untouched.
pub const PROXY_COMMAND_BASE: u32 = 0xFFFF_FF00;

/// Resolve a REE service by identifier and obtain its handle.
pub const GENERIC_OPEN: u32 = PROXY_COMMAND_BASE;
/// Release a resolved service handle.
pub const GENERIC_CLOSE: u32 = PROXY_COMMAND_BASE + 1;
/// Ask the service to initialise itself.
pub const GENERIC_SERVICE_START: u32 = PROXY_COMMAND_BASE + 2;
/// Ask the service to quiesce.
pub const GENERIC_SERVICE_STOP: u32 = PROXY_COMMAND_BASE + 3;

/// Whether `command_id` falls in the range reserved for the proxy.
pub const fn is_proxy_command(command_id: u32) -> bool {
    command_id >= PROXY_COMMAND_BASE
}

/// Human-readable name for a proxy command id.
pub fn command_name(command_id: u32) -> &'static str {
    match command_id {
        GENERIC_OPEN => "generic-open",
        GENERIC_CLOSE => "generic-close",
        GENERIC_SERVICE_START => "service-start",
        GENERIC_SERVICE_STOP => "service-stop",
        id if is_proxy_command(id) => "proxy-reserved",
        _ => "service-command",
    }
}

/// Cancellation request timeout in milliseconds.
///
/// Passed verbatim to the invocation primitive; nothing here waits on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeout(u32);

impl Timeout {
    pub const ZERO: Self = Self(0);
    pub const INFINITE: Self = Self(u32::MAX);

    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    pub const fn as_millis(&self) -> u32 {
        self.0
    }

    pub fn is_infinite(&self) -> bool {
        *self == Self::INFINITE
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::INFINITE
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            f.write_str("infinite")
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

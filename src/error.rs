//! Error types for ree-session.

use std::fmt;

use thiserror::Error;

/// GlobalPlatform result code reported by the proxy or the REE service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeeErrorCode(u32);

impl TeeErrorCode {
    pub const GENERIC: Self = Self(0xFFFF_0000);
    pub const ACCESS_DENIED: Self = Self(0xFFFF_0001);
    pub const CANCEL: Self = Self(0xFFFF_0002);
    pub const BAD_FORMAT: Self = Self(0xFFFF_0005);
    pub const BAD_PARAMETERS: Self = Self(0xFFFF_0006);
    pub const BAD_STATE: Self = Self(0xFFFF_0007);
    pub const ITEM_NOT_FOUND: Self = Self(0xFFFF_0008);
    pub const NOT_SUPPORTED: Self = Self(0xFFFF_000A);
    pub const OUT_OF_MEMORY: Self = Self(0xFFFF_000C);
    pub const BUSY: Self = Self(0xFFFF_000D);
    pub const COMMUNICATION: Self = Self(0xFFFF_000E);
    pub const TARGET_DEAD: Self = Self(0xFFFF_3024);

    /// Wrap a raw result code.
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw u32 value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TeeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Which layer produced a result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ReturnOrigin {
    /// The client API itself.
    Api = 1,
    /// The communication stack towards the proxy.
    Comms = 2,
    /// The secure OS.
    Tee = 3,
    /// The proxy or the service behind it.
    TrustedApp = 4,
}

impl fmt::Display for ReturnOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Api => "api",
            Self::Comms => "comms",
            Self::Tee => "tee",
            Self::TrustedApp => "trusted-app",
        };
        f.write_str(name)
    }
}

/// Failure of a single invocation on a proxy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeFailure {
    pub code: TeeErrorCode,
    pub origin: ReturnOrigin,
}

impl InvokeFailure {
    pub fn new(code: TeeErrorCode, origin: ReturnOrigin) -> Self {
        Self { code, origin }
    }
}

/// Main error type for ree-session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReeSessionError {
    /// Caller-supplied parameters do not match their declared types.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// Resources for the session could not be obtained.
    #[error("out of memory")]
    OutOfMemory,

    /// The connection to the generic proxy could not be opened.
    #[error("failed to open session on generic proxy: {code}")]
    ProxyConnect { code: TeeErrorCode },

    /// A command sent through the proxy failed.
    #[error("command {command:#x} failed: {code} (origin {origin})")]
    Command {
        command: u32,
        code: TeeErrorCode,
        origin: ReturnOrigin,
    },

    /// The session has already been torn down.
    #[error("REE session already closed")]
    SessionClosed,

    /// Text could not be parsed as a UUID.
    #[error("invalid uuid: {0}")]
    InvalidUuid(String),

    /// A parameter type nibble outside the known codes.
    #[error("invalid parameter type: {0:#x}")]
    InvalidParamType(u32),

    /// Configuration problem.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ReeSessionError {
    pub(crate) fn command(command: u32, failure: InvokeFailure) -> Self {
        Self::Command {
            command,
            code: failure.code,
            origin: failure.origin,
        }
    }

    /// The GlobalPlatform result code equivalent to this error.
    pub fn code(&self) -> TeeErrorCode {
        match self {
            Self::BadParameters(_) | Self::InvalidUuid(_) | Self::InvalidParamType(_) => {
                TeeErrorCode::BAD_PARAMETERS
            }
            Self::OutOfMemory => TeeErrorCode::OUT_OF_MEMORY,
            Self::SessionClosed => TeeErrorCode::BAD_STATE,
            Self::ProxyConnect { code } | Self::Command { code, .. } => *code,
            Self::Config(_) => TeeErrorCode::GENERIC,
        }
    }

    /// Origin of the failure, present only when an invocation was attempted.
    pub fn origin(&self) -> Option<ReturnOrigin> {
        match self {
            Self::Command { origin, .. } => Some(*origin),
            _ => None,
        }
    }
}

/// Convenience Result type for ree-session operations.
pub type Result<T> = std::result::Result<T, ReeSessionError>;

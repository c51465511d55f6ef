//! Command-line interface for the `ree-session` binary.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::uuid::TeeUuid;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Service to open (overrides config file).
    pub service: Option<TeeUuid>,
    /// Command id to invoke once the session is open.
    pub command: Option<u32>,
    /// Value placed in slot 1 of the command.
    pub value: u32,
    /// Cancellation timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("service") => {
                let value: String = parser.value()?.parse()?;
                result.service = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("service", value))?,
                );
            }
            Short('C') | Long("command") => {
                result.command = Some(parse_u32(parser.value()?.parse()?, "command")?);
            }
            Short('a') | Long("value") => {
                result.value = parse_u32(parser.value()?.parse()?, "value")?;
            }
            Short('t') | Long("timeout") => {
                result.timeout_ms = Some(parse_u32(parser.value()?.parse()?, "timeout")?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Accept decimal or `0x`-prefixed hex.
fn parse_u32(value: String, name: &'static str) -> Result<u32, ArgsError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ArgsError::InvalidValue(name, value))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"ree-session {version}
Open a session with a REE service through the loopback generic proxy

USAGE:
    ree-session [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -s, --service <UUID>    Service to open
    -C, --command <ID>      Command id to invoke [default: 0]
    -a, --value <N>         Value sent in slot 1 [default: 0]
    -t, --timeout <MS>      Cancellation timeout in milliseconds
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    REE_SESSION_SERVICE     Service UUID (overrides config)
    REE_SESSION_TIMEOUT_MS  Timeout in milliseconds (overrides config)
    REE_SESSION_LOG_LEVEL   Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Invoke command 7 with value 999 on a service
    ree-session -s 8aaaf200-2450-11e4-abe2-0002a5d5c51b -C 7 -a 999

    # Trace every proxy call
    ree-session -s 8aaaf200-2450-11e4-abe2-0002a5d5c51b -l trace
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("ree-session {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

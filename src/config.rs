//! Configuration management for the `ree-session` binary.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::protocol::Timeout;
use crate::uuid::TeeUuid;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session configuration.
    pub session: SessionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Session configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Service to open.
    pub service: Option<TeeUuid>,
    /// Cancellation timeout for start and invoke, in milliseconds.
    pub timeout_ms: u32,
    /// Command id invoked once the session is open.
    pub command: u32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            service: None,
            timeout_ms: Timeout::INFINITE.as_millis(),
            command: 0,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(service) = std::env::var("REE_SESSION_SERVICE") {
            let uuid = service
                .parse()
                .map_err(|_| ConfigError::InvalidService(service.clone()))?;
            self.session.service = Some(uuid);
        }

        if let Ok(timeout) = std::env::var("REE_SESSION_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse() {
                self.session.timeout_ms = timeout;
            }
        }

        if let Ok(level) = std::env::var("REE_SESSION_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(service) = args.service {
            self.session.service = Some(service);
        }

        if let Some(command) = args.command {
            self.session.command = command;
        }

        if let Some(timeout) = args.timeout_ms {
            self.session.timeout_ms = timeout;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// The service to open, which must be configured somewhere.
    pub fn service(&self) -> Result<TeeUuid, ConfigError> {
        self.session.service.ok_or(ConfigError::MissingService)
    }

    /// Timeout for the start and invoke steps.
    pub fn timeout(&self) -> Timeout {
        Timeout::from_millis(self.session.timeout_ms)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Service identifier that does not parse as a UUID.
    InvalidService(String),
    /// No service configured.
    MissingService,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidService(s) => write!(f, "invalid service uuid: {}", s),
            Self::MissingService => write!(f, "no service configured (use --service)"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::ReeSessionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

//! Configuration data model

use std::path::PathBuf;

/// Largest payload dwm may announce before a reply is rejected (8 MiB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 8 * 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Socket to connect to. `None` falls back to `$DWM_IPC_SOCKET`, then
    /// `/tmp/dwm.sock`.
    pub socket_path: Option<PathBuf>,
    pub max_payload_size: u32,
    pub log_level: LogLevel,
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            log_level: LogLevel::Warn,
            reconnect: ReconnectConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// How `dwm-msg subscribe` reconnects after dwm closes the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Attempts after the socket closes before giving up. 0 disables
    /// reconnecting.
    pub max_retries: u32,
    /// First delay between attempts, doubled after each failure
    pub initial_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 500,
        }
    }
}

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::BackendPaths;

const DEFAULT_PORT: u16 = 9990;
const DEFAULT_BACKEND_CMD: &str = "cbci-mcp";
const DEFAULT_CONFIG_PATH: &str = "cbci-mcp/config.yaml";
const DEFAULT_QUESTIONS_PATH: &str = "cbci-mcp/questions.yaml";
const DEFAULT_SCHEMA_PATH: &str = "cbci-mcp/schema.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("BACKEND_URL must be set when BACKEND_MODE is http")]
    MissingBackendUrl,
}

/// Transport used to reach the question-answering backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// JSON-RPC over the stdio of one long-lived child process.
    Mcp,
    /// One shell command per question.
    Command,
    /// One HTTP POST per question.
    Http,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcp => "mcp",
            Self::Command => "command",
            Self::Http => "http",
        }
    }
}

impl FromStr for BackendMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mcp" => Ok(Self::Mcp),
            "command" | "cmd" => Ok(Self::Command),
            "http" => Ok(Self::Http),
            _ => Err(ConfigError::Invalid {
                name: "BACKEND_MODE",
                expected: "one of mcp, command, http",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub mode: BackendMode,
    pub command: String,
    pub url: Option<String>,
    pub paths: BackendPaths,
    /// `None` lets a slow backend hold the request open indefinitely.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub backend: BackendSettings,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// - `CBCI_HOST` (default `0.0.0.0`) and `PORT` (default 9990): bind address
    /// - `CBCI_CONFIG_PATH`, `CBCI_QUESTIONS_PATH`, `CBCI_SCHEMA_PATH`: backend files
    /// - `BACKEND_MODE` (`mcp` | `command` | `http`, default `mcp`)
    /// - `BACKEND_CMD` (default `cbci-mcp`), `BACKEND_URL` (required for `http`)
    /// - `BACKEND_TIMEOUT_MS` (optional): per-call deadline
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = match var("CBCI_HOST") {
            Some(value) => value.trim().parse::<IpAddr>().map_err(|_| ConfigError::Invalid {
                name: "CBCI_HOST",
                expected: "an IP address",
                value,
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let port = match var("PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a port number",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let mode = match var("BACKEND_MODE") {
            Some(value) => value.parse::<BackendMode>()?,
            None => BackendMode::Mcp,
        };

        let url = var("BACKEND_URL");
        if mode == BackendMode::Http && url.is_none() {
            return Err(ConfigError::MissingBackendUrl);
        }

        let timeout = match var("BACKEND_TIMEOUT_MS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BACKEND_TIMEOUT_MS",
                        expected: "a positive integer",
                        value,
                    })
                }
            },
            None => None,
        };

        let path = |name: &str, default: &str| {
            PathBuf::from(var(name).unwrap_or_else(|| default.to_string()))
        };

        Ok(Self {
            host,
            port,
            backend: BackendSettings {
                mode,
                command: var("BACKEND_CMD").unwrap_or_else(|| DEFAULT_BACKEND_CMD.to_string()),
                url,
                paths: BackendPaths {
                    config_path: path("CBCI_CONFIG_PATH", DEFAULT_CONFIG_PATH),
                    questions_path: path("CBCI_QUESTIONS_PATH", DEFAULT_QUESTIONS_PATH),
                    schema_path: path("CBCI_SCHEMA_PATH", DEFAULT_SCHEMA_PATH),
                },
                timeout,
            },
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

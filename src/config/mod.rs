//! Configuration management.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, else `./aws-docs-mcp.toml`, else
//!    `<config dir>/aws-docs-mcp/config.toml`)
//! 3. environment variables prefixed `AWS_DOCS_MCP`, with `__` between
//!    section and key
//! 4. `MCP_SERVER_PORT`
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8000
//! transport = "sse"
//!
//! [upstream]
//! timeout_secs = 30
//! allowed_hosts = ["docs.aws.amazon.com"]
//!
//! [extraction]
//! strategy = "dom"
//!
//! [sessions]
//! inactivity_timeout_secs = 1800
//! sse_max_age_secs = 300
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```
//!
//! ```bash
//! export AWS_DOCS_MCP__SERVER__PORT=9000
//! export AWS_DOCS_MCP__EXTRACTION__STRATEGY=text
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::content::ExtractionStrategy;
use crate::mcp::ToolSettings;
use crate::sources::{AwsEndpoints, RECOMMENDATIONS_API_URL, SEARCH_API_URL};
use crate::utils::{AWS_DOCS_HOST, DEFAULT_USER_AGENT};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "AWS_DOCS_MCP";

/// Port override kept for compatibility with existing deployments
pub const PORT_ENV_VAR: &str = "MCP_SERVER_PORT";

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "aws-docs-mcp.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub extraction: ExtractionConfig,
    pub sessions: SessionConfig,
    pub logging: LoggingConfig,
}

/// Which transports `serve` starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Line-delimited JSON-RPC over stdin/stdout
    #[default]
    Stdio,
    /// Server-Sent Events with a companion POST endpoint
    Sse,
    /// Streamable HTTP, one POST per request
    Http,
    /// SSE and Streamable HTTP on one listener
    All,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "sse" => Ok(Self::Sse),
            "http" | "streamable-http" | "streamable_http" => Ok(Self::Http),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown transport '{}', expected stdio, sse, http or all",
                other
            )),
        }
    }
}

/// Listener settings for the HTTP transports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub transport: TransportMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            transport: TransportMode::Stdio,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream documentation services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub search_url: String,
    pub recommend_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub allowed_hosts: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            search_url: SEARCH_API_URL.to_string(),
            recommend_url: RECOMMENDATIONS_API_URL.to_string(),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allowed_hosts: vec![AWS_DOCS_HOST.to_string()],
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn endpoints(&self) -> AwsEndpoints {
        AwsEndpoints {
            search_url: self.search_url.clone(),
            recommend_url: self.recommend_url.clone(),
        }
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            timeout: self.timeout(),
            allowed_hosts: self.allowed_hosts.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub strategy: ExtractionStrategy,
}

/// Session lifetimes for the streaming transports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session expires
    pub inactivity_timeout_secs: u64,
    /// Hard cap on the age of an SSE connection
    pub sse_max_age_secs: u64,
    /// Interval between SSE heartbeat comments
    pub heartbeat_secs: u64,
    /// Interval of the background expiry sweep
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 30 * 60,
            sse_max_age_secs: 5 * 60,
            heartbeat_secs: 30,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn sse_max_age(&self) -> Duration {
        Duration::from_secs(self.sse_max_age_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl Config {
    /// Render as TOML, as printed by `aws-docs-mcp config`
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Load configuration from an optional file plus the process environment
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    build_config(path, None)
}

/// Load configuration with an explicit environment instead of the process one
pub fn build_config(
    path: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let port_override = match &env {
        Some(vars) => vars.get(PORT_ENV_VAR).cloned(),
        None => std::env::var(PORT_ENV_VAR).ok(),
    };

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("upstream.allowed_hosts")
            .source(env),
    );

    if let Some(raw) = port_override {
        let port = raw.trim().parse::<u16>().map_err(|e| {
            config::ConfigError::Message(format!("{} must be a port number: {}", PORT_ENV_VAR, e))
        })?;
        builder = builder.set_override("server.port", i64::from(port))?;
    }

    builder.build()?.try_deserialize()
}

/// Find the configuration file in the default locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("aws-docs-mcp").join("config.toml"))
        .filter(|path| path.is_file())
}

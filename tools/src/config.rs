//! Server configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "dockhand.toml";
const CONFIG_ENV: &str = "DOCKHAND_CONFIG";

/// Root configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    /// `local`, `unix:///path/to/docker.sock`, `tcp://host:port` or `http://host:port`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout on the daemon connection
    #[serde(default = "default_docker_timeout")]
    pub timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_docker_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolsConfig {
    /// Upper bound on a single tool invocation
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl ToolsConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_server_name() -> String { "docker-server".into() }
fn default_endpoint() -> String { "local".into() }
fn default_docker_timeout() -> u64 { 120 }
fn default_call_timeout() -> u64 { 60 }
fn default_log_level() -> String { "info".into() }

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file at this path; built-in defaults apply
    Defaults(PathBuf),
}

/// Load configuration from `$DOCKHAND_CONFIG` or `./dockhand.toml`
pub fn load_config() -> Result<(Config, ConfigSource)> {
    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(Path::new(&config_path))
}

/// Load configuration from `path`, falling back to defaults when it does not exist.
///
/// Runs before logging is set up, so the caller reports the source.
pub fn load_config_from(path: &Path) -> Result<(Config, ConfigSource)> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    } else {
        Ok((Config::default(), ConfigSource::Defaults(path.to_path_buf())))
    }
}

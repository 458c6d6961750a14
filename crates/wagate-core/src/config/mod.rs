mod defaults;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::GatewayError;
use defaults::*;

/// Top-level wagate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub groups: GroupsConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Overridden by the `PORT` environment variable.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// WhatsApp session settings.
///
/// Credentials live in `{session_dir}/whatsapp.db`, owned by the client library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_session_dir")]
    pub session_dir: String,
    /// Name shown under "Linked devices" on the phone.
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            device_name: default_device_name(),
        }
    }
}

/// Group cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
    /// Delay before a refresh triggered by connect or a group change event.
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            snapshot_file: default_snapshot_file(),
            refresh_delay_ms: default_refresh_delay_ms(),
        }
    }
}

impl GroupsConfig {
    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }
}

/// Reconnect behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Pause before reconnecting after a non-logout close. 0 = immediately.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily-rotated log files. Unset = stderr only.
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, falling back to defaults if missing,
/// then apply environment overrides.
pub fn load(path: &str) -> Result<Config, GatewayError> {
    load_with_port(path, std::env::var("PORT").ok().as_deref())
}

/// [`load`] with an explicit `PORT` value instead of the process environment.
pub fn load_with_port(path: &str, port: Option<&str>) -> Result<Config, GatewayError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse(&content)?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config, port)?;
    Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse(content: &str) -> Result<Config, GatewayError> {
    toml::from_str(content)
        .map_err(|e| GatewayError::Config(format!("failed to parse config: {}", e)))
}

/// Apply the `PORT` override.
pub fn apply_env_overrides(config: &mut Config, port: Option<&str>) -> Result<(), GatewayError> {
    if let Some(raw) = port {
        let raw = raw.trim();
        if !raw.is_empty() {
            config.server.port = raw
                .parse()
                .map_err(|_| GatewayError::Config(format!("invalid PORT value '{raw}'")))?;
        }
    }
    Ok(())
}

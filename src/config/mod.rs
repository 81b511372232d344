//! Configuration module - JSON config file with defaults and validation

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Top-level server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub universe: UniverseConfig,
    pub network: NetworkConfig,
    pub panels: PanelsConfig,
    pub missions: MissionsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tcp_port: u16,
    pub max_connections: usize,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub enable_cors: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub tick_rate: u32,
    pub physics_enabled: bool,
    pub collision_enabled: bool,
    pub max_objects: usize,
    pub gravity_constant: f64,
    pub drag_coefficient: f64,
    pub max_gravity_distance: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Seconds between server heartbeat pings
    pub heartbeat_interval: u64,
    /// Seconds of silence before a client is considered gone
    pub client_timeout: u64,
    /// Maximum inbound frame size in bytes (floor of 512 is enforced)
    pub max_message_size: usize,
    /// Milliseconds between state broadcast samples
    pub state_update_interval: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelsConfig {
    pub enabled: bool,
    pub max_panels: usize,
    /// Seconds between panel liveness sweeps
    pub heartbeat_interval: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionsConfig {
    pub scripts_path: String,
    pub auto_load: bool,
    pub default_mission: String,
    pub allowed_libraries: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub output_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            universe: UniverseConfig::default(),
            network: NetworkConfig::default(),
            panels: PanelsConfig::default(),
            missions: MissionsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            tcp_port: 8081,
            max_connections: 100,
            read_timeout: 60,
            write_timeout: 60,
            enable_cors: true,
        }
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            physics_enabled: true,
            collision_enabled: true,
            max_objects: 10_000,
            gravity_constant: 6.6743e-11,
            drag_coefficient: 0.01,
            max_gravity_distance: 100_000.0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: 30,
            client_timeout: 60,
            max_message_size: 65_536,
            state_update_interval: 16,
        }
    }
}

impl Default for PanelsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_panels: 20,
            heartbeat_interval: 30,
        }
    }
}

impl Default for MissionsConfig {
    fn default() -> Self {
        Self {
            scripts_path: "./missions".to_string(),
            auto_load: false,
            default_mission: "tutorial.lua".to_string(),
            allowed_libraries: vec![
                "math".to_string(),
                "string".to_string(),
                "table".to_string(),
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output_file: "./logs/starbridge.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. A missing file is replaced with
    /// the defaults, which are written back to disk for the operator to edit.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, creating default config");
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let data = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to disk as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Validate value ranges; called on load and on admin replacement
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid(format!(
                "invalid server port: {}",
                self.server.port
            )));
        }

        if self.server.tcp_port == 0 {
            return Err(ConfigError::Invalid(format!(
                "invalid TCP port: {}",
                self.server.tcp_port
            )));
        }

        if self.universe.tick_rate < 1 || self.universe.tick_rate > 1000 {
            return Err(ConfigError::Invalid(format!(
                "invalid tick rate: {}",
                self.universe.tick_rate
            )));
        }

        if self.network.heartbeat_interval < 1 {
            return Err(ConfigError::Invalid(format!(
                "invalid heartbeat interval: {}",
                self.network.heartbeat_interval
            )));
        }

        if self.network.client_timeout < self.network.heartbeat_interval {
            return Err(ConfigError::Invalid(
                "client timeout must be greater than heartbeat interval".to_string(),
            ));
        }

        if self.panels.max_panels < 1 || self.panels.max_panels > 50 {
            return Err(ConfigError::Invalid(format!(
                "invalid max panels: {}",
                self.panels.max_panels
            )));
        }

        const VALID_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress)
    }

    pub fn tcp_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.tcp_port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis((1000 / self.universe.tick_rate.max(1)) as u64)
    }

    pub fn state_update_duration(&self) -> Duration {
        Duration::from_millis(self.network.state_update_interval.max(1))
    }

    pub fn panel_sweep_duration(&self) -> Duration {
        Duration::from_secs(self.panels.heartbeat_interval.max(1))
    }

    pub fn client_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.network.client_timeout.max(1))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_tick_rate() {
        let mut config = Config::default();
        config.universe.tick_rate = 0;
        assert!(config.validate().is_err());

        config.universe.tick_rate = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_client_timeout_below_heartbeat() {
        let mut config = Config::default();
        config.network.heartbeat_interval = 30;
        config.network.client_timeout = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_max_panels_and_log_level() {
        let mut config = Config::default();
        config.panels.max_panels = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.panels.max_panels = 51;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.tcp_port, 8081);
        assert_eq!(config.universe.tick_rate, 60);
    }

    #[test]
    fn tick_duration_from_rate() {
        let mut config = Config::default();
        config.universe.tick_rate = 50;
        assert_eq!(config.tick_duration(), Duration::from_millis(20));
    }
}

use crate::{Error, Result};
use std::path::Path;

pub mod loader;

pub const DEFAULT_LOCAL_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PEER_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_RECEIVE_PORT: &str = "1725";
pub const DEFAULT_SEND_PORT: &str = "26027";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
pub const DEFAULT_HOLD_DELAY_MS: u64 = 1500;
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 100;
const CONFIG_DIR_NAME: &str = ".simdeck";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Identifiers for the simulator UDP link.
///
/// Ports are kept as strings: the send port may be the `"dynamic"`
/// sentinel, and all four values pass through address resolution as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub local_address: String,
    pub peer_address: String,
    pub receive_port: String,
    pub send_port: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            local_address: DEFAULT_LOCAL_ADDRESS.to_string(),
            peer_address: DEFAULT_PEER_ADDRESS.to_string(),
            receive_port: DEFAULT_RECEIVE_PORT.to_string(),
            send_port: DEFAULT_SEND_PORT.to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Read connection identifiers from a host global-settings payload.
    /// If any of the four fields is empty or missing, the whole set falls
    /// back to the defaults rather than mixing user and default values.
    pub fn from_host_settings(settings: &serde_json::Value) -> Self {
        let field = |key: &str| {
            settings
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let local_address = field("ip_address");
        let peer_address = field("ip_address_partner");
        let receive_port = field("listener_port");
        let send_port = field("send_port");

        if local_address.is_empty()
            || peer_address.is_empty()
            || receive_port.is_empty()
            || send_port.is_empty()
        {
            return Self::default();
        }
        Self {
            local_address,
            peer_address,
            receive_port,
            send_port,
        }
    }
}

/// User-supplied settings loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub poll_interval_ms: u64,
    pub hold_delay_ms: u64,
    pub receive_timeout_ms: u64,
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            hold_delay_ms: DEFAULT_HOLD_DELAY_MS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        loader::load_or_default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn save(&self) -> Result<()> {
        loader::save(self)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        loader::save_to_path(self, path)
    }
}

pub(crate) fn validate(config: &Config) -> Result<()> {
    let conn = &config.connection;
    if conn.local_address.is_empty()
        || conn.peer_address.is_empty()
        || conn.receive_port.is_empty()
        || conn.send_port.is_empty()
    {
        return Err(Error::Config(
            "connection identifiers must not be empty".to_string(),
        ));
    }
    if conn.receive_port.parse::<u16>().is_err() {
        return Err(Error::Config(format!(
            "receive_port must be a port number, got '{}'",
            conn.receive_port
        )));
    }
    if conn.send_port != crate::net::socket::DYNAMIC_SEND_PORT
        && conn.send_port.parse::<u16>().is_err()
    {
        return Err(Error::Config(format!(
            "send_port must be a port number or 'dynamic', got '{}'",
            conn.send_port
        )));
    }
    if config.poll_interval_ms == 0 {
        return Err(Error::Config("poll_interval must be non-zero".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_settings_fall_back_as_a_set() {
        let partial = json!({"ip_address": "192.168.1.10", "listener_port": "1725"});
        assert_eq!(
            ConnectionConfig::from_host_settings(&partial),
            ConnectionConfig::default()
        );

        let complete = json!({
            "ip_address": "192.168.1.10",
            "ip_address_partner": "192.168.1.20",
            "listener_port": "1725",
            "send_port": "dynamic",
        });
        let parsed = ConnectionConfig::from_host_settings(&complete);
        assert_eq!(parsed.peer_address, "192.168.1.20");
        assert_eq!(parsed.send_port, "dynamic");
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn validate_rejects_bad_ports() {
        let mut config = Config::default();
        config.connection.receive_port = "not-a-port".into();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.connection.send_port = "dynamic".into();
        assert!(validate(&config).is_ok());

        config.connection.send_port = "65536".into();
        assert!(validate(&config).is_err());
    }
}

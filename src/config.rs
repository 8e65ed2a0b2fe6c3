//! Configuration file support for the relay.
//!
//! Loads settings from `~/.config/udp-logger-relay/config.toml` on Linux
//! (or platform-appropriate location on other OSes), or from an explicit
//! path given on the command line.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::contact::{DialectSelection, StationProfile};
use crate::relay::DEFAULT_MAX_IN_FLIGHT;

/// Default UDP port the relay listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 2333;

/// Default UDP port of N1MM Logger Plus.
pub const DEFAULT_TARGET_PORT: u16 = 12060;

/// Commented default configuration written by `init-config`.
pub const DEFAULT_CONFIG: &str = r#"# UDP Logger Relay configuration

# Log every detection, parse and send step
verbose = false

# Log level when not verbose: error, warn, info, debug, trace
log_level = "info"

# Print statistics every N seconds (0 disables)
stats_interval = 0

# Maximum datagrams processed concurrently; extra datagrams are dropped
max_in_flight = 64

# Prometheus metrics HTTP endpoint
metrics_enabled = false
metrics_port = 9090

# Where logging applications send their UDP messages
[listen]
address = "0.0.0.0"
port = 2333

# Where N1MM XML is forwarded
[target]
address = "127.0.0.1"
port = 12060

[formatting]
# Detect the sending application from each message
auto_detect = true

# auto, wsjt-x, fldigi, js8call, varac, n1mm or general
source_type = "auto"

# Station identity attached to every forwarded contact
[formatting.n1mm]
station = "UDP-RELAY"
operator = "OP"
contest = "GENERAL"
"#;

/// Listen socket settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Interface address to bind.
    pub address: String,

    /// UDP port to bind.
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: DEFAULT_LISTEN_PORT,
        }
    }
}

/// Forwarding target settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Host name or address of the N1MM-compatible logger.
    pub address: String,

    /// UDP port of the logger.
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: DEFAULT_TARGET_PORT,
        }
    }
}

/// Message translation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormattingConfig {
    /// Detect the dialect of each message.
    pub auto_detect: bool,

    /// `auto` or a fixed dialect name.
    pub source_type: String,

    /// Station identity for outbound records.
    pub n1mm: StationProfile,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            auto_detect: true,
            source_type: "auto".to_string(),
            n1mm: StationProfile::default(),
        }
    }
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log every pipeline step.
    pub verbose: bool,

    /// Log level used when not verbose.
    pub log_level: String,

    /// Print statistics every N seconds (0 disables).
    pub stats_interval: u64,

    /// Maximum number of datagrams processed concurrently.
    pub max_in_flight: usize,

    /// Enable Prometheus metrics HTTP endpoint.
    pub metrics_enabled: bool,

    /// Port for Prometheus metrics HTTP endpoint.
    pub metrics_port: u16,

    pub listen: ListenConfig,

    pub target: TargetConfig,

    pub formatting: FormattingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            log_level: "info".to_string(),
            stats_interval: 0,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            metrics_enabled: false,
            metrics_port: 9090,
            listen: ListenConfig::default(),
            target: TargetConfig::default(),
            formatting: FormattingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default config file
    /// is read if present and built-in defaults are used otherwise.
    /// Returns an error if the file exists but is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                Self::load_file(path)
            }
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Config::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
    }

    /// Returns the path to the default config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("udp-logger-relay/config.toml"))
    }

    /// Write the commented default configuration to `path`.
    ///
    /// Parent directories are created. Refuses to overwrite an existing file.
    pub fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists: {}", path.display());
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Resolve how each message's dialect is chosen.
    pub fn dialect_selection(&self) -> Result<DialectSelection> {
        DialectSelection::from_config(self.formatting.auto_detect, &self.formatting.source_type)
            .context("Invalid formatting.source_type")
    }

    /// `address:port` of the listen socket.
    pub fn listen_addr(&self) -> String {
        host_port(&self.listen.address, self.listen.port)
    }

    /// `address:port` of the forwarding target.
    pub fn target_addr(&self) -> String {
        host_port(&self.target.address, self.target.port)
    }

    /// Validate all configuration settings.
    pub fn validate(&self) -> Result<()> {
        self.dialect_selection()?;
        if self.listen.port == 0 {
            bail!("listen.port must be non-zero");
        }
        if self.target.port == 0 {
            bail!("target.port must be non-zero");
        }
        if self.max_in_flight == 0 {
            bail!("max_in_flight must be at least 1");
        }
        Ok(())
    }
}

/// Join a host and port, bracketing bare IPv6 addresses.
fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Dialect;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:2333");
        assert_eq!(config.target_addr(), "127.0.0.1:12060");
        assert!(config.formatting.auto_detect);
        assert_eq!(config.formatting.source_type, "auto");
        assert_eq!(config.formatting.n1mm.station, "UDP-RELAY");
        assert_eq!(config.max_in_flight, 64);
        assert!(!config.metrics_enabled);
        assert_eq!(config.metrics_port, 9090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            [listen]
            port = 2237
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.listen.port, 2237);
        // Other fields should use defaults
        assert_eq!(config.listen.address, "0.0.0.0");
        assert_eq!(config.target.port, DEFAULT_TARGET_PORT);
        assert_eq!(config.formatting.n1mm.operator, "OP");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            verbose = true
            log_level = "debug"
            stats_interval = 60
            max_in_flight = 8
            metrics_enabled = true
            metrics_port = 9091

            [listen]
            address = "127.0.0.1"
            port = 2442

            [target]
            address = "n1mm.local"
            port = 12061

            [formatting]
            auto_detect = false
            source_type = "varac"

            [formatting.n1mm]
            station = "W1AW"
            operator = "Hiram"
            contest = "ARRL-DX"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.verbose);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.stats_interval, 60);
        assert_eq!(config.max_in_flight, 8);
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_port, 9091);
        assert_eq!(config.listen_addr(), "127.0.0.1:2442");
        assert_eq!(config.target_addr(), "n1mm.local:12061");
        assert_eq!(config.formatting.n1mm.contest, "ARRL-DX");
        assert_eq!(
            config.dialect_selection().unwrap(),
            DialectSelection::Fixed(Dialect::VarAc)
        );
    }

    #[test]
    fn test_default_config_file_matches_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.listen, defaults.listen);
        assert_eq!(parsed.target, defaults.target);
        assert_eq!(parsed.formatting, defaults.formatting);
        assert_eq!(parsed.max_in_flight, defaults.max_in_flight);
        assert_eq!(parsed.stats_interval, defaults.stats_interval);
        assert_eq!(parsed.log_level, defaults.log_level);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.formatting.source_type = "ardop".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.listen.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.target.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ipv6_addresses_are_bracketed() {
        let mut config = Config::default();
        config.listen.address = "::".to_string();
        config.target.address = "[::1]".to_string();
        assert_eq!(config.listen_addr(), "[::]:2333");
        assert_eq!(config.target_addr(), "[::1]:12060");
    }

    #[test]
    fn test_auto_detect_off_parses_generic() {
        let mut config = Config::default();
        config.formatting.auto_detect = false;
        assert_eq!(
            config.dialect_selection().unwrap(),
            DialectSelection::Fixed(Dialect::Generic)
        );
    }

    #[test]
    fn test_write_default_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        Config::write_default(&path).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.listen.port, DEFAULT_LISTEN_PORT);

        // Refuses to overwrite
        assert!(Config::write_default(&path).is_err());
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "listen = [").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}

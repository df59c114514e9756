//! Application configuration: file loading, defaults, and validation.

use std::borrow::Cow;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probe::IcmpConfig;
use crate::scheduler::RunConfig;

/// Errors raised while loading the configuration. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("failed to parse JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

// =============================================================================
// Constants
// =============================================================================

/// Default pause between probe rounds, in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = crate::scheduler::DEFAULT_INTERVAL.as_secs();

/// Default metrics endpoint port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default number of targets probed at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Largest `probe.count`: one ICMP sequence number per echo request.
pub const MAX_PROBE_COUNT: u32 = u16::MAX as u32;

/// `${NAME}` or `${NAME:-fallback}`.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Replace environment references in raw config text.
///
/// A variable that is unset or empty takes the fallback, or the empty string
/// when no fallback is given, as `${NAME:-fallback}` does in a POSIX shell.
fn substitute_env(raw: &str) -> Cow<'_, str> {
    ENV_REFERENCE.replace_all(raw, |caps: &Captures| {
        let fallback = caps.get(2).map_or("", |m| m.as_str());
        match std::env::var(&caps[1]) {
            Ok(value) if !value.is_empty() => value,
            _ => fallback.to_string(),
        }
    })
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Metrics endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: "0.0.0.0").
    pub bind: String,

    /// Port (default: 8000).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Listen address built from `bind` and `port`. IPv6 binds such as `::`
    /// are accepted as-is, without brackets.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if `bind` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind.trim().parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.bind
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
///
/// ```yaml
/// servers:
///   - 1.1.1.1
///   - example.com
/// interval: 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Targets to probe, in order.
    pub servers: Vec<String>,

    /// Seconds to sleep between rounds (default: 10).
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Metrics endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Echo probe settings.
    #[serde(default)]
    pub probe: IcmpConfig,

    /// Targets probed at once within a round (default: 1, sequential).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl AppConfig {
    /// Configuration with the given targets and every other field defaulted.
    pub fn new(servers: Vec<String>) -> Self {
        Self {
            servers,
            interval: DEFAULT_INTERVAL_SECS,
            server: ServerConfig::default(),
            probe: IcmpConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Load configuration from a YAML or JSON file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let content = substitute_env(&raw);

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::ValidationError(
                "servers list cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "server address cannot be empty".to_string(),
                ));
            }
            if !seen.insert(server) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate server: '{}'",
                    server
                )));
            }
        }

        if self.interval == 0 {
            return Err(ConfigError::ValidationError(
                "interval must be a positive number of seconds".to_string(),
            ));
        }

        if self.probe.count == 0 {
            return Err(ConfigError::ValidationError(
                "probe count must be positive".to_string(),
            ));
        }

        if self.probe.count > MAX_PROBE_COUNT {
            return Err(ConfigError::ValidationError(format!(
                "probe count must be at most {}",
                MAX_PROBE_COUNT
            )));
        }

        if self.probe.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "probe timeout must be non-zero".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "concurrency must be positive".to_string(),
            ));
        }

        self.server.socket_addr()?;

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Pause between rounds.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Build the scheduler settings for one run.
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig::new(self.servers.clone(), self.interval())
            .with_attempts(self.probe.count)
            .with_concurrency(self.concurrency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = AppConfig::from_yaml("servers:\n  - 10.0.0.1\n  - example.com\n").unwrap();

        assert_eq!(config.servers, vec!["10.0.0.1", "example.com"]);
        assert_eq!(config.interval, 10);
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.probe, IcmpConfig::default());
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
servers: ["1.1.1.1"]
interval: 30
server:
  bind: 127.0.0.1
  port: 9100
probe:
  count: 3
  timeout: 500ms
  gap: 0s
concurrency: 8
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.probe.count, 3);
        assert_eq!(config.probe.timeout, Duration::from_millis(500));
        assert!(config.probe.gap.is_zero());

        let run = config.to_run_config();
        assert_eq!(run.targets, vec!["1.1.1.1"]);
        assert_eq!(run.attempts, 3);
        assert_eq!(run.concurrency, 8);
        assert_eq!(run.max_rounds, None);
    }

    #[test]
    fn test_json_config() {
        let config = AppConfig::from_json(r#"{"servers": ["10.0.0.1"], "interval": 5}"#).unwrap();
        assert_eq!(config.interval, 5);
    }

    #[test]
    fn test_missing_servers_is_parse_error() {
        let err = AppConfig::from_yaml("interval: 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_errors() {
        let cases: Vec<(AppConfig, &str)> = vec![
            (AppConfig::new(vec![]), "servers list cannot be empty"),
            (AppConfig::new(vec!["".to_string()]), "server address cannot be empty"),
            (
                AppConfig::new(vec!["a".to_string(), "a".to_string()]),
                "duplicate server",
            ),
            (
                AppConfig {
                    interval: 0,
                    ..AppConfig::new(vec!["a".to_string()])
                },
                "interval must be a positive",
            ),
            (
                AppConfig {
                    concurrency: 0,
                    ..AppConfig::new(vec!["a".to_string()])
                },
                "concurrency must be positive",
            ),
            (
                AppConfig {
                    probe: IcmpConfig::default().with_count(0),
                    ..AppConfig::new(vec!["a".to_string()])
                },
                "probe count must be positive",
            ),
            (
                AppConfig {
                    probe: IcmpConfig::default().with_count(MAX_PROBE_COUNT + 1),
                    ..AppConfig::new(vec!["a".to_string()])
                },
                "probe count must be at most 65535",
            ),
            (
                AppConfig {
                    server: ServerConfig {
                        bind: "not-an-ip".to_string(),
                        port: 8000,
                    },
                    ..AppConfig::new(vec!["a".to_string()])
                },
                "invalid server bind address",
            ),
        ];

        for (config, expected) in cases {
            let err = config.validate().unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "expected '{}' in '{}'",
                expected,
                err
            );
        }
    }

    #[test]
    fn test_ipv6_bind_builds_listen_address() {
        let config = AppConfig::from_yaml(
            "servers: [\"::1\"]\nserver:\n  bind: \"::\"\n  port: 9100\n",
        )
        .unwrap();

        let addr = config.server.socket_addr().unwrap();
        assert!(addr.is_ipv6());
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 9100);
        assert_eq!(addr.to_string(), "[::]:9100");
    }

    #[test]
    fn test_ipv4_bind_builds_listen_address() {
        let addr = ServerConfig::default().socket_addr().unwrap();
        assert_eq!(addr, "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_max_probe_count_is_accepted() {
        let config = AppConfig {
            probe: IcmpConfig::default().with_count(MAX_PROBE_COUNT),
            ..AppConfig::new(vec!["a".to_string()])
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_substitute_env_without_references() {
        let raw = "servers: [1.1.1.1]\ninterval: 10\n";
        assert!(matches!(substitute_env(raw), Cow::Borrowed(_)));
        assert_eq!(substitute_env(raw), raw);
    }

    #[test]
    fn test_substitute_env_fallbacks() {
        assert_eq!(
            substitute_env("- ${PING_EXPORTER_UNSET_TARGET_A:-9.9.9.9}"),
            "- 9.9.9.9"
        );
        assert_eq!(substitute_env("- '${PING_EXPORTER_UNSET_TARGET_B}'"), "- ''");
    }

    #[test]
    fn test_substitute_env_set_and_empty_values() {
        // SAFETY: only this test touches these variables.
        unsafe {
            std::env::set_var("PING_EXPORTER_SET_TARGET", "192.0.2.7");
            std::env::set_var("PING_EXPORTER_EMPTY_TARGET", "");
        }

        assert_eq!(
            substitute_env("- ${PING_EXPORTER_SET_TARGET:-10.0.0.1}"),
            "- 192.0.2.7"
        );
        assert_eq!(
            substitute_env("- ${PING_EXPORTER_EMPTY_TARGET:-10.0.0.1}"),
            "- 10.0.0.1"
        );

        // SAFETY: see above.
        unsafe {
            std::env::remove_var("PING_EXPORTER_SET_TARGET");
            std::env::remove_var("PING_EXPORTER_EMPTY_TARGET");
        }
    }

    #[test]
    fn test_load_yaml_file_with_env_expansion() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "servers:\n  - ${{PING_EXPORTER_UNSET_VAR_XYZ:-192.0.2.1}}").unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.servers, vec!["192.0.2.1"]);
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"servers": ["192.0.2.1"], "interval": 2}}"#).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.interval, 2);
    }

    #[test]
    fn test_load_bundled_config() {
        let config = AppConfig::load("configs/config.yaml").unwrap();

        assert_eq!(config.servers.len(), 3);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.probe, IcmpConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/ping-exporter.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}

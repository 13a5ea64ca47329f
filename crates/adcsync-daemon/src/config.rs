//! Configuration for adcsync-daemon

use adcsync_deployer::{DeclarationSettings, DeployerConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Appliance connection
    #[serde(default)]
    pub appliance: ApplianceConfig,

    /// Control loop tuning
    #[serde(default)]
    pub deployer: DeployerConfig,

    /// Envelope settings stamped onto every declaration
    #[serde(default)]
    pub declaration: DeclarationSettings,

    /// Partitions reset to the default tenant skeleton at start-up
    #[serde(default)]
    pub managed_partitions: Vec<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
        }
    }
}

/// Appliance connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplianceConfig {
    /// Management base URL, e.g. `https://10.0.0.5`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Accept self-signed management certificates
    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: String::new(),
            password: String::new(),
            insecure: false,
            timeout_secs: default_request_timeout(),
        }
    }
}

impl ApplianceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
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

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://127.0.0.1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `ADCSYNC_`-prefixed environment variables (`__` separates sections).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ADCSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(config.managed_partitions.is_empty());
        assert!(!config.deployer.filter_tenants);
        assert_eq!(config.appliance.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.deployer.unavailable_backoff_secs, 30);
        assert_eq!(config.deployer.error_backoff_secs, 10);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
managed_partitions = ["k8s"]

[appliance]
base_url = "https://10.1.1.4"
username = "admin"
insecure = true

[deployer]
post_delay_secs = 5
filter_tenants = true

[declaration]
log_level = "debug"
"#
        )
        .unwrap();

        let config = DaemonConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.appliance.base_url, "https://10.1.1.4");
        assert!(config.appliance.insecure);
        assert_eq!(config.deployer.post_delay_secs, 5);
        assert!(config.deployer.filter_tenants);
        assert_eq!(config.deployer.error_backoff_secs, 10);
        assert_eq!(config.declaration.log_level.as_deref(), Some("debug"));
        assert_eq!(config.managed_partitions, vec!["k8s".to_string()]);
    }
}

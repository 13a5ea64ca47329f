//! Deployer and declaration configuration

use adcsync_types::ResponseCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Control loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployerConfig {
    /// Pause before each post, except the first after start-up
    #[serde(default)]
    pub post_delay_secs: u64,

    /// How long to wait for a newer request once the delay has elapsed
    #[serde(default = "default_coalesce_grace")]
    pub coalesce_grace_ms: u64,

    /// Post one declaration per tenant instead of one unified declaration
    #[serde(default)]
    pub filter_tenants: bool,

    /// Retry wait after the appliance reported itself unavailable
    #[serde(default = "default_unavailable_backoff")]
    pub unavailable_backoff_secs: u64,

    /// Retry wait after any other retryable rejection
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            post_delay_secs: 0,
            coalesce_grace_ms: default_coalesce_grace(),
            filter_tenants: false,
            unavailable_backoff_secs: default_unavailable_backoff(),
            error_backoff_secs: default_error_backoff(),
        }
    }
}

impl DeployerConfig {
    pub fn post_delay(&self) -> Duration {
        Duration::from_secs(self.post_delay_secs)
    }

    pub fn coalesce_grace(&self) -> Duration {
        Duration::from_millis(self.coalesce_grace_ms)
    }

    /// Error-specific wait before replaying failures
    pub fn backoff_for(&self, code: ResponseCode) -> Duration {
        match code {
            ResponseCode::ServiceUnavailable => {
                Duration::from_secs(self.unavailable_backoff_secs)
            }
            ResponseCode::CommonError => Duration::from_secs(self.error_backoff_secs),
            _ => Duration::ZERO,
        }
    }

    /// Retry wait: never shorter than the post delay
    pub fn retry_wait(&self, code: ResponseCode) -> Duration {
        self.backoff_for(code).max(self.post_delay())
    }
}

/// Envelope settings stamped onto every declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationSettings {
    /// `controls.userAgent` of the envelope
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Base URL of the published declaration schemas
    #[serde(default = "default_schema_base_url")]
    pub schema_base_url: String,

    /// Route domain of the skeleton written for managed partitions
    #[serde(default)]
    pub default_route_domain: u32,

    /// Optional `logLevel` knob
    #[serde(default)]
    pub log_level: Option<String>,

    /// Optional `persist` knob
    #[serde(default)]
    pub persist: Option<bool>,
}

impl Default for DeclarationSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            schema_base_url: default_schema_base_url(),
            default_route_domain: 0,
            log_level: None,
            persist: None,
        }
    }
}

fn default_coalesce_grace() -> u64 {
    1
}

fn default_unavailable_backoff() -> u64 {
    30
}

fn default_error_backoff() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("adcsync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_schema_base_url() -> String {
    "https://raw.githubusercontent.com/F5Networks/f5-appsvcs-extension/master/schema".to_string()
}

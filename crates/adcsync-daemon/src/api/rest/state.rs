//! Application state for API handlers

use adcsync_deployer::DeployerHandle;
use adcsync_types::{DeployerResponse, NetworkingSnapshot, VersionInfo};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Deployer loop handle
    pub deployer: DeployerHandle,

    /// Latest networking snapshot
    pub networking: watch::Receiver<NetworkingSnapshot>,

    /// Last response taken from the deployer mailbox
    pub last_response: Arc<RwLock<Option<DeployerResponse>>>,

    /// Negotiated declaration version
    pub appliance: VersionInfo,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        deployer: DeployerHandle,
        networking: watch::Receiver<NetworkingSnapshot>,
        appliance: VersionInfo,
    ) -> Self {
        Self {
            deployer,
            networking,
            last_response: Arc::new(RwLock::new(None)),
            appliance,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }

    /// Drain the deployer mailbox into `last_response` until the mailbox
    /// handle is dropped with the task
    pub fn spawn_response_consumer(&self) -> tokio::task::JoinHandle<()> {
        let mailbox = self.deployer.responses().clone();
        let last_response = self.last_response.clone();
        tokio::spawn(async move {
            loop {
                let response = mailbox.take().await;
                tracing::debug!(
                    success = response.success,
                    code = %response.code,
                    "Deployer response received"
                );
                *last_response.write().await = Some(response);
            }
        })
    }
}

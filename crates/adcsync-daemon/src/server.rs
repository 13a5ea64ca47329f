//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::notifier::WatchNotifier;
use crate::overlay::JsonMergeOverlay;
use crate::poster::HttpPoster;
use adcsync_deployer::{negotiate, ConfigDeployer, DeclarationBuilder, DeclarationPoster};
use std::sync::Arc;
use tokio::net::TcpListener;

/// adcsync Daemon Server
pub struct Server {
    config: DaemonConfig,
    poster: Arc<dyn DeclarationPoster>,
}

impl Server {
    /// Create a new server talking HTTP to the configured appliance
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let poster = Arc::new(HttpPoster::new(&config.appliance)?);
        Ok(Self::with_poster(config, poster))
    }

    /// Create a server over any poster
    pub fn with_poster(config: DaemonConfig, poster: Arc<dyn DeclarationPoster>) -> Self {
        Self { config, poster }
    }

    /// Negotiate the declaration version and start the deployer loop.
    ///
    /// Managed partitions are reset before the loop accepts work.
    pub async fn start_deployer(&self) -> DaemonResult<(AppState, tokio::task::JoinHandle<()>)> {
        let version = negotiate(self.poster.as_ref()).await?;

        let builder = DeclarationBuilder::new(
            version.clone(),
            self.config.declaration.clone(),
            Arc::new(JsonMergeOverlay),
        );
        let notifier = Arc::new(WatchNotifier::new());
        let networking = notifier.subscribe();

        let (deployer, handle) = ConfigDeployer::new(
            self.config.deployer.clone(),
            builder,
            self.poster.clone(),
            notifier,
        );

        for partition in &self.config.managed_partitions {
            deployer.clean_tenant(partition).await;
        }

        let task = deployer.spawn();
        Ok((AppState::new(handle, networking, version), task))
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let (state, deployer_task) = self.start_deployer().await?;
        let consumer_task = state.spawn_response_consumer();

        // Create router
        let app = create_router(state, self.config.server.enable_cors);

        // Create listener
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("adcsync daemon listening on {}", addr);

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("adcsync daemon shutting down");

        // Queue and ledger are not persisted
        deployer_task.abort();
        consumer_task.abort();

        Ok(())
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adcsync_deployer::MockPoster;
    use adcsync_types::{ApplianceVersion, ResponseCode};

    #[tokio::test]
    async fn test_start_cleans_managed_partitions() {
        let poster = Arc::new(MockPoster::new());
        let config = DaemonConfig {
            managed_partitions: vec!["k8s".to_string()],
            ..Default::default()
        };

        let server = Server::with_poster(config, poster.clone());
        let (state, task) = server.start_deployer().await.unwrap();

        assert_eq!(state.appliance.version, "3.45.0");
        let post = poster.last_post().unwrap();
        assert_eq!(post.target_url, "mock://declare/k8s");
        assert_eq!(
            post.declaration.tenant("k8s").unwrap()["Shared"]["template"],
            "shared"
        );
        assert_eq!(state.deployer.status().attempts, 0);
        task.abort();
    }

    #[tokio::test]
    async fn test_start_fails_on_old_appliance() {
        let poster = Arc::new(
            MockPoster::new()
                .with_default(ResponseCode::Ok)
                .with_version(ApplianceVersion {
                    version: "3.10.0".into(),
                    build: "1".into(),
                    schema_version: "3.10.0".into(),
                }),
        );

        let server = Server::with_poster(DaemonConfig::default(), poster.clone());
        assert!(matches!(
            server.start_deployer().await,
            Err(DaemonError::Deployer(_))
        ));
        assert_eq!(poster.post_count(), 0);
    }
}

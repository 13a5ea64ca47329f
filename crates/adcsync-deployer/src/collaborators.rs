//! Capabilities the deployer consumes from the outside world.
//!
//! The transport, overlay validation and networking fan-out are owned by
//! other components; the deployer only calls through these traits.

use adcsync_types::{ApplianceVersion, Declaration, NetworkingSnapshot, PostOutcome};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors reported by a poster outside of classified post outcomes
#[derive(Debug, Error)]
pub enum PosterError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Transport boundary to the appliance
#[async_trait]
pub trait DeclarationPoster: Send + Sync {
    /// Post a declaration and classify the outcome
    async fn post(&self, declaration: &Declaration, target_url: &str) -> PostOutcome;

    /// Endpoint for a post. `None` targets the whole declaration, otherwise
    /// the post is scoped to the named tenants.
    fn target_url(&self, tenants: Option<&[String]>) -> String;

    /// Query the appliance's extension version, build and schema version
    async fn query_version(&self) -> Result<ApplianceVersion, PosterError>;
}

/// Applies a raw override overlay on top of a merged declaration
pub trait OverlayMerger: Send + Sync {
    /// Returns `None` when the overlay cannot be applied
    fn merge(&self, overlay: &str, base: &Declaration) -> Option<Declaration>;
}

impl<F> OverlayMerger for F
where
    F: Fn(&str, &Declaration) -> Option<Declaration> + Send + Sync,
{
    fn merge(&self, overlay: &str, base: &Declaration) -> Option<Declaration> {
        self(overlay, base)
    }
}

/// Overlay merger that never applies anything
pub struct NoOverlay;

impl OverlayMerger for NoOverlay {
    fn merge(&self, _overlay: &str, _base: &Declaration) -> Option<Declaration> {
        None
    }
}

/// Receives networking facts after every apply attempt
pub trait NetworkingNotifier: Send + Sync {
    fn publish(&self, snapshot: &NetworkingSnapshot);
}

/// Notifier that only logs
pub struct NoopNotifier;

impl NetworkingNotifier for NoopNotifier {
    fn publish(&self, snapshot: &NetworkingSnapshot) {
        debug!(members = snapshot.members.len(), "Networking snapshot dropped");
    }
}

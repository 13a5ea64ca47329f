//! adcsync Deployer
//!
//! Drives a remote appliance towards a locally computed declaration.
//!
//! ## Architectural Boundaries
//!
//! - `adcsync-types` owns: the data model and response taxonomy
//! - `adcsync-deployer` owns: declaration building, diffing against the last
//!   applied state, the failure ledger, version negotiation and the control loop
//! - `adcsync-daemon` owns: HTTP transport, overlay parsing, intake and status surface
//!
//! The deployer never talks to the network itself. Everything outside the
//! loop is reached through the traits in [`collaborators`].
//!
//! ## Usage
//!
//! ```no_run
//! use adcsync_deployer::{
//!     negotiate, ConfigDeployer, DeclarationBuilder, DeclarationSettings, DeployerConfig,
//!     MockPoster, NoOverlay, RecordingNotifier,
//! };
//! use adcsync_types::{TriggerEvent, WorkRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let poster = Arc::new(MockPoster::new());
//! let version = negotiate(poster.as_ref()).await?;
//!
//! let builder = DeclarationBuilder::new(version, DeclarationSettings::default(), Arc::new(NoOverlay));
//! let (deployer, handle) = ConfigDeployer::new(
//!     DeployerConfig::default(),
//!     builder,
//!     poster,
//!     Arc::new(RecordingNotifier::new()),
//! );
//! deployer.spawn();
//!
//! handle.submit(WorkRequest::new(TriggerEvent::Startup))?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod builder;
pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod deployer;
pub mod error;
pub mod mailbox;
pub mod mock;
pub mod state;
pub mod version;

pub use builder::DeclarationBuilder;
pub use classifier::{FailureLedger, ResponseTally};
pub use collaborators::{
    DeclarationPoster, NetworkingNotifier, NoOverlay, NoopNotifier, OverlayMerger, PosterError,
};
pub use config::{DeclarationSettings, DeployerConfig};
pub use deployer::{ConfigDeployer, DeployerHandle};
pub use error::{DeployerError, Result};
pub use mailbox::{Mailbox, MailboxStats};
pub use mock::{MockPoster, RecordedPost, RecordingNotifier};
pub use state::{ActiveState, WorkingConfig};
pub use version::{negotiate, resolve, BUILT_MAX, SUPPORTED_MIN};

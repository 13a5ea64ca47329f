//! adcsync Daemon library
//!
//! This module provides the components wrapped around the deployer loop:
//! - Configuration loading
//! - HTTP transport to the appliance
//! - Override overlay merging
//! - REST intake and status handlers
//! - Server lifecycle management

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod notifier;
pub mod overlay;
pub mod poster;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, DaemonResult};
pub use notifier::WatchNotifier;
pub use overlay::JsonMergeOverlay;
pub use poster::HttpPoster;
pub use server::Server;

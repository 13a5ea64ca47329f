//! Deployer error types

use adcsync_types::{ProductVersion, TypesError};
use thiserror::Error;

use crate::collaborators::PosterError;

/// Errors that escape the deployer.
///
/// Per-tenant transport failures never surface here; they are absorbed by
/// the failure ledger and retried inside the loop.
#[derive(Debug, Error)]
pub enum DeployerError {
    #[error("Malformed appliance version: {0}")]
    Version(#[from] TypesError),

    #[error(
        "Appliance extension {reported} is not supported; upgrade it to {minimum} or above"
    )]
    IncompatibleVersion {
        reported: ProductVersion,
        minimum: ProductVersion,
    },

    #[error("Version query failed: {0}")]
    VersionQuery(#[from] PosterError),

    #[error("Deployer loop has stopped")]
    Closed,
}

/// Result type for deployer operations
pub type Result<T> = std::result::Result<T, DeployerError>;

//! Version negotiation with the appliance

use adcsync_types::{ApplianceVersion, ProductVersion, VersionInfo};
use tracing::{info, instrument, warn};

use crate::collaborators::DeclarationPoster;
use crate::error::{DeployerError, Result};

/// Oldest extension release declarations can be posted to
pub const SUPPORTED_MIN: ProductVersion = ProductVersion::new(3, 18);

/// Newest extension release this build knows the schema of
pub const BUILT_MAX: ProductVersion = ProductVersion::new(3, 45);

pub const DEFAULT_VERSION: &str = "3.45.0";
pub const DEFAULT_BUILD: &str = "5";
pub const DEFAULT_SCHEMA_VERSION: &str = "3.45.0";

/// Version stamped when the appliance runs something newer than this build
pub fn built_default() -> VersionInfo {
    VersionInfo::new(DEFAULT_VERSION, DEFAULT_BUILD, DEFAULT_SCHEMA_VERSION)
}

/// Pick the declaration version for an appliance report
pub fn resolve(reported: &ApplianceVersion) -> Result<VersionInfo> {
    let numeric = ProductVersion::parse(&reported.version)?;

    if numeric < SUPPORTED_MIN {
        return Err(DeployerError::IncompatibleVersion {
            reported: numeric,
            minimum: SUPPORTED_MIN,
        });
    }

    if numeric > BUILT_MAX {
        warn!(
            reported = %reported.version,
            max = %BUILT_MAX,
            "Appliance is newer than supported, stamping built-in version"
        );
        return Ok(built_default().with_appliance(numeric));
    }

    Ok(VersionInfo::new(
        reported.version.clone(),
        &reported.build,
        reported.schema_version.clone(),
    )
    .with_appliance(numeric))
}

/// Query the appliance and resolve its version
#[instrument(skip(poster))]
pub async fn negotiate(poster: &dyn DeclarationPoster) -> Result<VersionInfo> {
    let reported = poster.query_version().await?;
    let version = resolve(&reported)?;
    info!(
        version = %version.version,
        release = %version.release,
        schema = %version.schema_version,
        "Negotiated declaration version"
    );
    Ok(version)
}

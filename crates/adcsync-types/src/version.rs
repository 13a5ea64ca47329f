//! Appliance and declaration schema versions

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric `major.minor` of a declarative extension release
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductVersion {
    pub major: u32,
    pub minor: u32,
}

impl ProductVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse the `major.minor` prefix of a dotted version such as `3.45.0`.
    ///
    /// Every dotted component must be numeric and at least two must be
    /// present.
    pub fn parse(version: &str) -> Result<Self> {
        let malformed = || TypesError::MalformedVersion(version.to_string());

        let parts = version
            .trim()
            .split('.')
            .map(|part| part.parse::<u32>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>>>()?;

        match parts.as_slice() {
            [major, minor, ..] => Ok(Self::new(*major, *minor)),
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Version triple as reported by the appliance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplianceVersion {
    pub version: String,
    pub build: String,
    pub schema_version: String,
}

/// Negotiated version stamped onto every declaration envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Extension version, e.g. `3.45.0`
    pub version: String,
    /// `<version>-<build>`, used in the schema reference
    pub release: String,
    /// Declaration `schemaVersion`
    pub schema_version: String,
    /// What the appliance itself reported, if negotiation ran
    pub appliance: Option<ProductVersion>,
}

impl VersionInfo {
    pub fn new(
        version: impl Into<String>,
        build: impl AsRef<str>,
        schema_version: impl Into<String>,
    ) -> Self {
        let version = version.into();
        Self {
            release: format!("{}-{}", version, build.as_ref()),
            version,
            schema_version: schema_version.into(),
            appliance: None,
        }
    }

    pub fn with_appliance(mut self, appliance: ProductVersion) -> Self {
        self.appliance = Some(appliance);
        self
    }
}

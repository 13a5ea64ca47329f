//! Tenant fragments and their sources

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Tenant name to configuration subtree, sorted by name
pub type TenantMap = BTreeMap<String, Value>;

/// A user-supplied config source contributing tenant fragments.
///
/// Only fragments from a source whose `validated` flag is set are ever
/// posted on their own in per-tenant mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapSource {
    pub namespace: String,
    pub name: String,

    /// Fragments declared by this source
    #[serde(default)]
    pub tenants: TenantMap,

    /// Pool members referenced by the fragments
    #[serde(default)]
    pub endpoints: Vec<PoolMember>,

    /// Schema validation passed for this source
    #[serde(default)]
    pub validated: bool,
}

impl ConfigMapSource {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            tenants: TenantMap::new(),
            endpoints: Vec::new(),
            validated: false,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>, body: Value) -> Self {
        self.tenants.insert(tenant.into(), body);
        self
    }

    pub fn with_endpoint(mut self, member: PoolMember) -> Self {
        self.endpoints.push(member);
        self
    }

    pub fn validated(mut self, validated: bool) -> Self {
        self.validated = validated;
        self
    }

    pub fn declares(&self, tenant: &str) -> bool {
        self.tenants.contains_key(tenant)
    }
}

impl fmt::Display for ConfigMapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A pool member endpoint referenced by tenant configuration
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolMember {
    pub address: String,
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl PoolMember {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            session: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_defaults_to_unvalidated() {
        let source: ConfigMapSource =
            serde_json::from_value(json!({ "namespace": "default", "name": "cm" })).unwrap();
        assert!(!source.validated);
        assert!(source.tenants.is_empty());
        assert_eq!(source.to_string(), "default/cm");
    }

    #[test]
    fn test_source_builder() {
        let source = ConfigMapSource::new("ns", "cm")
            .with_tenant("alpha", json!({ "class": "Tenant" }))
            .with_endpoint(PoolMember::new("10.0.0.1", 80))
            .validated(true);

        assert!(source.declares("alpha"));
        assert!(!source.declares("beta"));
        assert_eq!(source.endpoints.len(), 1);
        assert!(source.validated);
    }
}
